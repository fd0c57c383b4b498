//! The outbox record: one durable email-send intent and its lifecycle.

use aisle_common::{
    email::EmailType,
    ids::{GuestId, WeddingId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OutboxRecordId;

/// Lifecycle state of an outbox record.
///
/// `Pending` is the initial state. `Sent` and `Failed` are terminal for a
/// delivery attempt, but a `Failed` record may be re-opened by a manual
/// resend. `Sent` is never left again: it is a stronger guarantee than any
/// late failure report about a stale attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

impl OutboxStatus {
    /// Whether this status ends a delivery attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    #[must_use]
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// A durable email-send intent.
///
/// The recipient fields (`to_email`, `to_name`, `subject`) are a snapshot
/// taken at enqueue time; a later change to the guest does not retroactively
/// alter a pending record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: OutboxRecordId,
    pub wedding_id: WeddingId,
    pub guest_id: GuestId,
    pub email_type: EmailType,
    pub status: OutboxStatus,
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    /// Delivery attempts made so far. Monotonically non-decreasing; cumulative
    /// across resends.
    pub attempts: u32,
    /// Last failure detail. Present only while `status` is `Failed`.
    pub error_message: Option<String>,
    /// Set exactly once, on the transition into `Sent`.
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The caller-supplied part of a record, before the store assigns identity
/// and lifecycle fields.
#[derive(Debug, Clone)]
pub struct NewOutboxRecord {
    pub wedding_id: WeddingId,
    pub guest_id: GuestId,
    pub email_type: EmailType,
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
}

impl NewOutboxRecord {
    /// Materialize a full record in its initial state.
    #[must_use]
    pub fn into_record(self, id: OutboxRecordId) -> OutboxRecord {
        let now = Utc::now();
        OutboxRecord {
            id,
            wedding_id: self.wedding_id,
            guest_id: self.guest_id,
            email_type: self.email_type,
            status: OutboxStatus::Pending,
            to_email: self.to_email,
            to_name: self.to_name,
            subject: self.subject,
            attempts: 0,
            error_message: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A status transition requested against a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// A delivery attempt succeeded.
    Sent,
    /// A delivery attempt failed, with the failure detail.
    Failed(String),
    /// A manual/automatic resend re-opens a failed record. Attempts are
    /// preserved as cumulative history.
    Resend,
}

impl OutboxRecord {
    /// Apply a status update in place, enforcing the reconciliation rules.
    ///
    /// Returns `false` when the update was ignored because the record is
    /// already `Sent` ("sent wins"), or because the update is a no-op.
    /// `Sent` and `Failed` each count one delivery attempt; `Resend` does not.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        if self.status.is_sent() {
            return false;
        }

        let now = Utc::now();
        match update {
            StatusUpdate::Sent => {
                self.status = OutboxStatus::Sent;
                self.attempts = self.attempts.saturating_add(1);
                self.error_message = None;
                if self.sent_at.is_none() {
                    self.sent_at = Some(now);
                }
            }
            StatusUpdate::Failed(message) => {
                self.status = OutboxStatus::Failed;
                self.attempts = self.attempts.saturating_add(1);
                self.error_message = Some(message);
            }
            StatusUpdate::Resend => {
                if self.status != OutboxStatus::Failed {
                    return false;
                }
                self.status = OutboxStatus::Pending;
                self.error_message = None;
            }
        }
        self.updated_at = now;

        true
    }
}
