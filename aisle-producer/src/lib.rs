//! The job producer: turns a user action into a durable outbox row plus a
//! queued delivery job.
//!
//! The row always comes first. It is the audit trail and the idempotency
//! anchor; a job is never enqueued for a record that does not exist, and an
//! enqueue failure leaves the row `Pending` and recoverable rather than
//! silently dropped.

mod error;
mod features;
mod guests;
mod producer;
mod render;

pub use error::ProducerError;
pub use features::WeddingConfig;
pub use guests::{DirectoryError, Guest, GuestDirectory, MemoryGuestDirectory, RsvpStatus};
pub use producer::{
    JobProducer, ProducerConfig, ProducerDeps, QueueOutcome, SendOutcome, SendResult,
};
pub use render::{RenderError, RenderedEmail, StockTemplates, TemplateEngine};
