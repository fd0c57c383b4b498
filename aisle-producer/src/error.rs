//! Error types for the aisle-producer crate.

use aisle_common::ids::WeddingId;
use aisle_outbox::{OutboxError, OutboxRecordId};
use aisle_queue::QueueError;
use thiserror::Error;

use crate::{DirectoryError, RenderError};

/// Errors surfaced synchronously by the producer's entry points.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Malformed input; nothing was created or enqueued.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The selected (or resolved) guest set is empty.
    #[error("No guests selected for wedding {0}")]
    NoGuestsSelected(WeddingId),

    /// The wedding's configuration does not allow this email type.
    #[error("Feature disabled for wedding {wedding_id}: {feature}")]
    FeatureDisabled {
        wedding_id: WeddingId,
        feature: &'static str,
    },

    /// The outbox row exists but the queue rejected the job. The row remains
    /// `Pending` and recoverable; the caller sees this as a partial failure.
    #[error("Enqueue failed for record {record_id}: {source}")]
    Enqueue {
        record_id: OutboxRecordId,
        #[source]
        source: QueueError,
    },

    /// A queue operation failed before any outbox row was created.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Outbox store failure.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// Guest store failure.
    #[error("Guest directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Template rendering failure.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}
