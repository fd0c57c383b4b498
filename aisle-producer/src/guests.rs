//! The producer's read model of the external guest store.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use aisle_common::ids::{GuestId, WeddingId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::WeddingConfig;

/// RSVP state of a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Pending,
    Attending,
    Declined,
}

/// A guest as the producer sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    pub id: GuestId,
    pub wedding_id: WeddingId,
    pub name: String,
    pub email: String,
    pub rsvp_status: RsvpStatus,
}

/// Errors from the guest store boundary.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Wedding not found: {0}")]
    WeddingNotFound(WeddingId),

    #[error("Guest store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to weddings and their guest lists.
///
/// Guest-id lookups return the guests that currently exist; ids that have
/// been removed since are omitted rather than erroring, so a deferred job's
/// guest set is evaluated against the list as it is when the job runs.
#[async_trait]
pub trait GuestDirectory: Send + Sync + std::fmt::Debug {
    /// Feature configuration for a wedding.
    async fn wedding_config(&self, wedding_id: &WeddingId)
    -> Result<WeddingConfig, DirectoryError>;

    /// All guests of a wedding.
    async fn guests(&self, wedding_id: &WeddingId) -> Result<Vec<Guest>, DirectoryError>;

    /// The subset of `ids` that exist for this wedding, in `ids` order.
    async fn guests_by_id(
        &self,
        wedding_id: &WeddingId,
        ids: &[GuestId],
    ) -> Result<Vec<Guest>, DirectoryError>;
}

/// In-memory guest directory for tests and single-process runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryGuestDirectory {
    weddings: Arc<RwLock<HashMap<WeddingId, (WeddingConfig, Vec<Guest>)>>>,
}

impl MemoryGuestDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wedding and return its id.
    ///
    /// # Panics
    /// Panics if the directory lock is poisoned.
    pub fn add_wedding(&self, config: WeddingConfig) -> WeddingId {
        let id = WeddingId::generate();
        self.weddings
            .write()
            .expect("MemoryGuestDirectory lock poisoned")
            .insert(id, (config, Vec::new()));
        id
    }

    /// Add a guest to a registered wedding and return their id.
    ///
    /// # Panics
    /// Panics if the wedding is unknown or the directory lock is poisoned.
    pub fn add_guest(
        &self,
        wedding_id: WeddingId,
        name: &str,
        email: &str,
        rsvp_status: RsvpStatus,
    ) -> GuestId {
        let id = GuestId::generate();
        let mut weddings = self
            .weddings
            .write()
            .expect("MemoryGuestDirectory lock poisoned");
        let (_, guests) = weddings
            .get_mut(&wedding_id)
            .expect("wedding must be registered before adding guests");
        guests.push(Guest {
            id,
            wedding_id,
            name: name.to_string(),
            email: email.to_string(),
            rsvp_status,
        });
        id
    }

    /// Remove a guest, simulating a guest-list edit between schedule and
    /// dispatch.
    ///
    /// # Panics
    /// Panics if the directory lock is poisoned.
    pub fn remove_guest(&self, wedding_id: &WeddingId, guest_id: &GuestId) {
        if let Some((_, guests)) = self
            .weddings
            .write()
            .expect("MemoryGuestDirectory lock poisoned")
            .get_mut(wedding_id)
        {
            guests.retain(|guest| guest.id != *guest_id);
        }
    }
}

#[async_trait]
impl GuestDirectory for MemoryGuestDirectory {
    async fn wedding_config(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<WeddingConfig, DirectoryError> {
        self.weddings
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?
            .get(wedding_id)
            .map(|(config, _)| config.clone())
            .ok_or(DirectoryError::WeddingNotFound(*wedding_id))
    }

    async fn guests(&self, wedding_id: &WeddingId) -> Result<Vec<Guest>, DirectoryError> {
        self.weddings
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?
            .get(wedding_id)
            .map(|(_, guests)| guests.clone())
            .ok_or(DirectoryError::WeddingNotFound(*wedding_id))
    }

    async fn guests_by_id(
        &self,
        wedding_id: &WeddingId,
        ids: &[GuestId],
    ) -> Result<Vec<Guest>, DirectoryError> {
        let all = self.guests(wedding_id).await?;
        Ok(ids
            .iter()
            .filter_map(|id| all.iter().find(|guest| guest.id == *id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guests_by_id_omits_removed_guests() {
        let directory = MemoryGuestDirectory::new();
        let wedding = directory.add_wedding(WeddingConfig::default());
        let g1 = directory.add_guest(wedding, "A", "a@x.com", RsvpStatus::Pending);
        let g2 = directory.add_guest(wedding, "B", "b@x.com", RsvpStatus::Attending);

        directory.remove_guest(&wedding, &g1);

        let found = directory
            .guests_by_id(&wedding, &[g1, g2])
            .await
            .expect("lookup should succeed");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, g2);
    }

    #[tokio::test]
    async fn unknown_wedding_is_an_error() {
        let directory = MemoryGuestDirectory::new();
        assert!(matches!(
            directory.guests(&WeddingId::generate()).await,
            Err(DirectoryError::WeddingNotFound(_))
        ));
    }
}
