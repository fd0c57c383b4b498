//! Per-wedding feature configuration.

use aisle_common::email::EmailType;
use serde::{Deserialize, Serialize};

/// Feature flags of a single wedding.
///
/// The producer consults this through [`WeddingConfig::allows`] before
/// creating any outbox row: a pure predicate over configuration, not a
/// conditional scattered through send paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeddingConfig {
    /// Whether the reminders feature is enabled for this wedding.
    #[serde(default = "default_reminders")]
    pub reminders: bool,
}

const fn default_reminders() -> bool {
    true
}

impl Default for WeddingConfig {
    fn default() -> Self {
        Self {
            reminders: default_reminders(),
        }
    }
}

impl WeddingConfig {
    /// Whether this wedding may send emails of the given type.
    ///
    /// Only reminders are feature-gated; invitations and the other
    /// guest-facing types are part of the base product.
    #[must_use]
    pub const fn allows(&self, email_type: EmailType) -> bool {
        match email_type {
            EmailType::Reminder => self.reminders,
            EmailType::Invitation
            | EmailType::SaveTheDate
            | EmailType::ThankYou
            | EmailType::Update => true,
        }
    }
}
