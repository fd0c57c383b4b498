use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use aisle_common::ids::WeddingId;
use async_trait::async_trait;
use tracing::debug;

use crate::{
    NewOutboxRecord, OutboxError, OutboxRecord, OutboxRecordId, StatusUpdate, store::OutboxStore,
};

/// In-memory outbox store.
///
/// Records live in a `HashMap` behind an `RwLock`. Intended for tests and
/// single-process deployments; the durable source of truth in a split
/// deployment is a relational backend implementing the same trait.
///
/// # Concurrency
/// `update_status` holds the write lock for the duration of the conditional
/// apply, so the "sent wins" check and the write are one atomic step.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutboxStore {
    records: Arc<RwLock<HashMap<OutboxRecordId, OutboxRecord>>>,
}

impl MemoryOutboxStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the store.
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the
    /// underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn create(&self, record: NewOutboxRecord) -> crate::Result<OutboxRecordId> {
        if record.to_email.trim().is_empty() {
            return Err(OutboxError::Validation(
                "to_email must not be empty".to_string(),
            ));
        }
        if record.subject.trim().is_empty() {
            return Err(OutboxError::Validation(
                "subject must not be empty".to_string(),
            ));
        }

        let id = OutboxRecordId::generate();
        self.records.write()?.insert(id, record.into_record(id));

        Ok(id)
    }

    async fn get(&self, id: &OutboxRecordId) -> crate::Result<OutboxRecord> {
        self.records
            .read()?
            .get(id)
            .cloned()
            .ok_or(OutboxError::NotFound(*id))
    }

    async fn update_status(
        &self,
        id: &OutboxRecordId,
        update: StatusUpdate,
    ) -> crate::Result<OutboxRecord> {
        let mut records = self.records.write()?;
        let record = records.get_mut(id).ok_or(OutboxError::NotFound(*id))?;

        if !record.apply(update.clone()) {
            // Not surfaced to the caller: a late report about a stale attempt
            // losing to a terminal `Sent` is expected under at-least-once
            // delivery.
            debug!(
                record_id = %id,
                status = ?record.status,
                update = ?update,
                "Ignoring status update for record in terminal state"
            );
        }

        Ok(record.clone())
    }

    async fn list_for_wedding(&self, wedding_id: &WeddingId) -> crate::Result<Vec<OutboxRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()?
            .values()
            .filter(|record| record.wedding_id == *wedding_id)
            .cloned()
            .collect();

        // ULIDs are lexicographically sortable by creation time
        records.sort_by_key(|record| record.id);

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use aisle_common::{email::EmailType, ids::GuestId};

    use super::*;
    use crate::OutboxStatus;

    fn new_record(wedding_id: WeddingId) -> NewOutboxRecord {
        NewOutboxRecord {
            wedding_id,
            guest_id: GuestId::generate(),
            email_type: EmailType::Invitation,
            to_email: "a@x.com".to_string(),
            to_name: "A".to_string(),
            subject: "Invitation".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let store = MemoryOutboxStore::new();
        let wedding_id = WeddingId::generate();

        let id = store
            .create(new_record(wedding_id))
            .await
            .expect("create should succeed");

        let record = store.get(&id).await.expect("get should succeed");
        assert_eq!(record.id, id);
        assert_eq!(record.status, OutboxStatus::Pending);
        assert_eq!(record.attempts, 0);
    }

    #[tokio::test]
    async fn create_rejects_empty_email_and_subject() {
        let store = MemoryOutboxStore::new();
        let wedding_id = WeddingId::generate();

        let mut record = new_record(wedding_id);
        record.to_email = "  ".to_string();
        assert!(matches!(
            store.create(record).await,
            Err(OutboxError::Validation(_))
        ));

        let mut record = new_record(wedding_id);
        record.subject = String::new();
        assert!(matches!(
            store.create(record).await,
            Err(OutboxError::Validation(_))
        ));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_unknown_record_is_not_found() {
        let store = MemoryOutboxStore::new();
        let id = OutboxRecordId::generate();
        assert!(matches!(
            store.get(&id).await,
            Err(OutboxError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn update_status_is_conditional_on_sent() {
        let store = MemoryOutboxStore::new();
        let id = store
            .create(new_record(WeddingId::generate()))
            .await
            .expect("create should succeed");

        let record = store
            .update_status(&id, StatusUpdate::Sent)
            .await
            .expect("update should succeed");
        assert_eq!(record.status, OutboxStatus::Sent);
        assert_eq!(record.attempts, 1);
        let sent_at = record.sent_at;

        // A late failure report about a stale attempt must not regress Sent.
        let record = store
            .update_status(&id, StatusUpdate::Failed("late report".to_string()))
            .await
            .expect("update should succeed");
        assert_eq!(record.status, OutboxStatus::Sent);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.sent_at, sent_at);
        assert!(record.error_message.is_none());
    }

    #[tokio::test]
    async fn double_sent_does_not_double_count() {
        let store = MemoryOutboxStore::new();
        let id = store
            .create(new_record(WeddingId::generate()))
            .await
            .expect("create should succeed");

        let first = store
            .update_status(&id, StatusUpdate::Sent)
            .await
            .expect("update should succeed");
        let second = store
            .update_status(&id, StatusUpdate::Sent)
            .await
            .expect("update should succeed");

        assert_eq!(second.attempts, first.attempts);
        assert_eq!(second.sent_at, first.sent_at);
    }

    #[tokio::test]
    async fn list_for_wedding_scopes_and_orders() {
        let store = MemoryOutboxStore::new();
        let wedding_a = WeddingId::generate();
        let wedding_b = WeddingId::generate();

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(
                store
                    .create(new_record(wedding_a))
                    .await
                    .expect("create should succeed"),
            );
        }
        store
            .create(new_record(wedding_b))
            .await
            .expect("create should succeed");

        let listed = store
            .list_for_wedding(&wedding_a)
            .await
            .expect("list should succeed");
        assert_eq!(listed.len(), 3);

        ids.sort();
        let listed_ids: Vec<_> = listed.iter().map(|r| r.id).collect();
        assert_eq!(listed_ids, ids);
    }
}
