//! The third-party email transport, reduced to the one capability the
//! delivery system consumes: `send(to, subject, html, text)`.
//!
//! The real provider integration lives outside this repository; the
//! [`MockTransport`] here drives tests, the [`LogTransport`] local runs.

mod error;
mod log;
mod mock;

pub use error::TransportError;
pub use log::LogTransport;
pub use mock::{MockTransport, SentEmail};

use async_trait::async_trait;

/// Outbound email transport capability.
///
/// Calls are at-least-once from the caller's point of view: a crash between a
/// successful `send` and the recording of that success causes the same email
/// to be sent again. No idempotency key is passed; duplicate real-world
/// emails are an accepted risk of this design.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Deliver one email.
    ///
    /// # Errors
    /// [`TransportError`] describing why the provider did not accept the
    /// message.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), TransportError>;
}
