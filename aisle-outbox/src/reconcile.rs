//! Status reconciliation: writing a worker's outcome back into the store.
//!
//! Workers and the store may live in different services, so the write-back is
//! a narrow capability (`report(id, outcome)`) that can be an in-process call
//! today and a network call after a service split, without touching worker
//! logic.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{OutboxRecord, OutboxRecordId, StatusUpdate, store::OutboxStore};

/// The outcome of one delivery attempt, as observed by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The transport accepted the message.
    Sent,
    /// The transport rejected the message or the attempt errored.
    Failed(String),
}

/// Reports delivery outcomes into the outbox store.
///
/// The store, not the queue, is the attempt counter of record: every reported
/// outcome increments `attempts` on the record, regardless of how the queue
/// tracks its own retries.
#[async_trait]
pub trait StatusReconciler: Send + Sync + std::fmt::Debug {
    /// Report the outcome of one delivery attempt.
    ///
    /// Out-of-order reports are safe: a record already `Sent` absorbs any
    /// later report without change.
    ///
    /// # Errors
    /// `NotFound` if the record no longer exists.
    async fn report(
        &self,
        id: &OutboxRecordId,
        outcome: AttemptOutcome,
    ) -> crate::Result<OutboxRecord>;
}

/// In-process reconciler writing directly to an [`OutboxStore`].
#[derive(Debug, Clone)]
pub struct StoreReconciler {
    store: Arc<dyn OutboxStore>,
}

impl StoreReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusReconciler for StoreReconciler {
    async fn report(
        &self,
        id: &OutboxRecordId,
        outcome: AttemptOutcome,
    ) -> crate::Result<OutboxRecord> {
        let update = match outcome {
            AttemptOutcome::Sent => StatusUpdate::Sent,
            AttemptOutcome::Failed(message) => StatusUpdate::Failed(message),
        };

        self.store.update_status(id, update).await
    }
}

#[cfg(test)]
mod tests {
    use aisle_common::{
        email::EmailType,
        ids::{GuestId, WeddingId},
    };

    use super::*;
    use crate::{MemoryOutboxStore, NewOutboxRecord, OutboxStatus};

    async fn store_with_record() -> (Arc<MemoryOutboxStore>, OutboxRecordId) {
        let store = Arc::new(MemoryOutboxStore::new());
        let id = store
            .create(NewOutboxRecord {
                wedding_id: WeddingId::generate(),
                guest_id: GuestId::generate(),
                email_type: EmailType::Reminder,
                to_email: "g2@example.com".to_string(),
                to_name: "G2".to_string(),
                subject: "RSVP reminder".to_string(),
            })
            .await
            .expect("create should succeed");
        (store, id)
    }

    #[tokio::test]
    async fn sent_outcome_marks_record_sent() {
        let (store, id) = store_with_record().await;
        let reconciler = StoreReconciler::new(store);

        let record = reconciler
            .report(&id, AttemptOutcome::Sent)
            .await
            .expect("report should succeed");

        assert_eq!(record.status, OutboxStatus::Sent);
        assert_eq!(record.attempts, 1);
        assert!(record.sent_at.is_some());
    }

    #[tokio::test]
    async fn each_failed_attempt_is_counted() {
        let (store, id) = store_with_record().await;
        let reconciler = StoreReconciler::new(store);

        for attempt in 1..=3_u32 {
            let record = reconciler
                .report(&id, AttemptOutcome::Failed(format!("attempt {attempt}")))
                .await
                .expect("report should succeed");
            assert_eq!(record.attempts, attempt);
            assert_eq!(record.status, OutboxStatus::Failed);
        }
    }

    #[tokio::test]
    async fn late_failure_after_sent_is_absorbed() {
        let (store, id) = store_with_record().await;
        let reconciler = StoreReconciler::new(store);

        reconciler
            .report(&id, AttemptOutcome::Sent)
            .await
            .expect("report should succeed");
        let record = reconciler
            .report(&id, AttemptOutcome::Failed("duplicate attempt".to_string()))
            .await
            .expect("report should succeed");

        assert_eq!(record.status, OutboxStatus::Sent);
        assert_eq!(record.attempts, 1);
    }
}
