//! Job channel between email producers and delivery workers.
//!
//! The queue decouples the services that record send intents from the workers
//! that execute them:
//! - at-least-once delivery with lease-based single-consumer dispatch
//! - delayed/scheduled enqueue for batch sends
//! - per-job retry with exponential backoff, dead-letter parking after the
//!   final attempt

mod error;
mod job;
mod memory;
pub mod retry;

pub use error::{QueueError, Result};
pub use job::{EnqueueOptions, Job, JobId, ReminderJob, ScheduledEmailJob};
pub use memory::MemoryJobQueue;
pub use retry::RetryPolicy;

use async_trait::async_trait;

/// A job handed to exactly one worker at a time.
///
/// `attempt` is the 1-based number of this delivery attempt, counting lease
/// expiries (crashed consumers) as consumed attempts.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub id: JobId,
    pub job: Job,
    pub attempt: u32,
}

/// A job parked after its final failed attempt. Not redelivered
/// automatically.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub id: JobId,
    pub job: Job,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Ordered, persistent job channel contract.
///
/// Polymorphic over the backing implementation: the in-memory queue here, or
/// a durable broker/database-backed queue implementing the same semantics.
/// No two consumers see the same job concurrently, but a consumer crash after
/// partial execution causes redelivery: consumers must tolerate duplicates.
#[async_trait]
pub trait JobQueue: Send + Sync + std::fmt::Debug {
    /// Add a job, optionally delayed. Returns its queue identifier.
    ///
    /// # Errors
    /// `Closed` if the queue has been shut down.
    async fn enqueue(&self, job: Job, opts: EnqueueOptions) -> Result<JobId>;

    /// Lease the next due job, waiting until one is due.
    ///
    /// Returns `None` once the queue is closed; in-flight leases stay valid
    /// so draining workers can still ack or nack them.
    async fn dequeue(&self) -> Option<LeasedJob>;

    /// Acknowledge successful completion. The queue's copy is discarded; the
    /// outbox store remains the durable record of outcome.
    async fn ack(&self, id: &JobId) -> Result<()>;

    /// Report a failed attempt. The job is redelivered after backoff, or
    /// parked as a dead letter after the final attempt.
    async fn nack(&self, id: &JobId, error: &str) -> Result<()>;

    /// Stop handing out jobs. Pending dequeues return `None`.
    fn close(&self);

    /// Jobs parked after exhausting their attempts.
    fn dead_letters(&self) -> Vec<DeadLetter>;

    /// Number of live (not dead-lettered) jobs.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
