//! Error types for the aisle-outbox crate.

use thiserror::Error;

use crate::OutboxRecordId;

/// Top-level outbox store error type.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The record being created is malformed (empty recipient or subject).
    #[error("Validation error: {0}")]
    Validation(String),

    /// No record with the given id exists.
    #[error("Record not found: {0}")]
    NotFound(OutboxRecordId),

    /// Internal error (lock poisoning, backend failure, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for OutboxError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
