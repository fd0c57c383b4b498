//! The outbox store contract.

use aisle_common::ids::WeddingId;
use async_trait::async_trait;

use crate::{NewOutboxRecord, OutboxRecord, OutboxRecordId, StatusUpdate};

/// Durable store of email-send intents: the single source of truth for
/// whether an email was sent.
///
/// The in-memory implementation backs tests and single-process deployments;
/// a relational backend implements the same contract.
#[async_trait]
pub trait OutboxStore: Send + Sync + std::fmt::Debug {
    /// Create a record in its initial `Pending` state.
    ///
    /// # Errors
    /// `Validation` if `to_email` or `subject` is empty.
    async fn create(&self, record: NewOutboxRecord) -> crate::Result<OutboxRecordId>;

    /// Fetch a record by id.
    ///
    /// # Errors
    /// `NotFound` if no record with this id exists.
    async fn get(&self, id: &OutboxRecordId) -> crate::Result<OutboxRecord>;

    /// Apply a status update and return the record as stored afterwards.
    ///
    /// The update is conditional, not a blind overwrite: a record already
    /// `Sent` ignores any further update. That compare-and-set is the only
    /// concurrency control between overlapping delivery attempts; no lock is
    /// held across the transport call.
    ///
    /// # Errors
    /// `NotFound` if no record with this id exists.
    async fn update_status(
        &self,
        id: &OutboxRecordId,
        update: StatusUpdate,
    ) -> crate::Result<OutboxRecord>;

    /// All records for one wedding, in creation order.
    async fn list_for_wedding(&self, wedding_id: &WeddingId) -> crate::Result<Vec<OutboxRecord>>;
}
