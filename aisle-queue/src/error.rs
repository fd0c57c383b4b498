//! Error types for the aisle-queue crate.

use thiserror::Error;

use crate::JobId;

/// Top-level queue error type.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has been closed and accepts no new jobs.
    #[error("Queue is closed")]
    Closed,

    /// No job with the given id is known to the queue.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
