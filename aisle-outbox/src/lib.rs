pub mod backends;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod types;

pub use backends::MemoryOutboxStore;
pub use error::{OutboxError, Result};
pub use reconcile::{AttemptOutcome, StatusReconciler, StoreReconciler};
pub use record::{NewOutboxRecord, OutboxRecord, OutboxStatus, StatusUpdate};
pub use store::OutboxStore;
pub use types::OutboxRecordId;
