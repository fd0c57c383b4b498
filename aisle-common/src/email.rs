//! Guest-facing email categories.

use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The kind of guest-facing email being sent.
///
/// The type is a property of the outbox record, not of the queue channel:
/// any type can travel over either channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Invitation,
    Reminder,
    SaveTheDate,
    ThankYou,
    Update,
}

impl EmailType {
    /// The wire/storage name of this email type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::Reminder => "reminder",
            Self::SaveTheDate => "save_the_date",
            Self::ThankYou => "thank_you",
            Self::Update => "update",
        }
    }
}

impl Display for EmailType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", self.as_str())
    }
}
