//! Transport for local runs: log the email instead of sending it.

use async_trait::async_trait;
use tracing::info;

use crate::{Transport, TransportError};

/// A transport that accepts every email and writes it to the log.
///
/// Stands in for the provider in development and demo runs, where actually
/// emailing guests is the last thing anyone wants.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _html_body: &str,
        text_body: &str,
    ) -> Result<(), TransportError> {
        info!(to, subject, body = text_body, "Email (log transport)");
        Ok(())
    }
}
