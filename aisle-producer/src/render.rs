//! Body rendering boundary.
//!
//! Real templating lives outside this subsystem. Rendering happens at
//! enqueue time so the queued job carries finished bodies and workers have no
//! dependency on template state.

use aisle_common::email::EmailType;
use thiserror::Error;

use crate::Guest;

/// A fully rendered email, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Rendering failures at the templating boundary.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No template for email type {0}")]
    MissingTemplate(EmailType),

    #[error("Template rendering failed: {0}")]
    Failed(String),
}

/// Renders guest-facing email bodies.
pub trait TemplateEngine: Send + Sync + std::fmt::Debug {
    /// Render the email of `email_type` addressed to `guest`.
    fn render(&self, email_type: EmailType, guest: &Guest) -> Result<RenderedEmail, RenderError>;
}

/// Plain built-in templates, used where no template service is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockTemplates;

impl TemplateEngine for StockTemplates {
    fn render(&self, email_type: EmailType, guest: &Guest) -> Result<RenderedEmail, RenderError> {
        let (subject, line) = match email_type {
            EmailType::Invitation => ("You're invited!", "We would love to see you there."),
            EmailType::Reminder => ("RSVP reminder", "Please let us know if you can make it."),
            EmailType::SaveTheDate => ("Save the date", "Mark your calendar for our big day."),
            EmailType::ThankYou => ("Thank you", "Thank you for celebrating with us."),
            EmailType::Update => ("Wedding update", "Some details about our day have changed."),
        };

        let text_body = format!("Hi {},\n\n{line}\n", guest.name);
        let html_body = format!("<p>Hi {},</p><p>{line}</p>", guest.name);

        Ok(RenderedEmail {
            subject: subject.to_string(),
            html_body,
            text_body,
        })
    }
}
