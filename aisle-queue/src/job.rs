//! Job payload types carried by the queue.

use std::time::Duration;

use aisle_common::{
    email::EmailType,
    ids::{GuestId, WeddingId},
    ulid_id,
};
use aisle_outbox::OutboxRecordId;
use serde::{Deserialize, Serialize};

ulid_id! {
    /// Identifier assigned by the queue to an enqueued job.
    JobId
}

/// Delivery job for a single guest email.
///
/// References one outbox record and carries the fully rendered bodies.
/// Rendering happens at enqueue time, so workers have no dependency on
/// template state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    pub record_id: OutboxRecordId,
    pub html_body: String,
    pub text_body: String,
}

/// Deferred batch job for a future send.
///
/// Carries the guest-id set and the email type; fan-out into per-guest
/// records and [`ReminderJob`]s happens when the job fires, so guest list
/// membership is evaluated freshly at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEmailJob {
    pub wedding_id: WeddingId,
    pub guest_ids: Vec<GuestId>,
    pub email_type: EmailType,
}

/// Any job the queue can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Reminder(ReminderJob),
    Scheduled(ScheduledEmailJob),
}

/// Per-job options supplied at enqueue time.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    /// How long the job stays invisible before its first delivery.
    pub delay: Option<Duration>,
    /// Total delivery attempts before the job is dead-lettered.
    pub max_attempts: u32,
}

impl EnqueueOptions {
    /// An immediately deliverable job.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            delay: None,
            max_attempts,
        }
    }

    /// A job deliverable after `delay`.
    #[must_use]
    pub const fn delayed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay: Some(delay),
            max_attempts,
        }
    }
}
