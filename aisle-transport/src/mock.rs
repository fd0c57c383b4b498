//! Scriptable mock transport for tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{Transport, TransportError};

/// An email the mock accepted, as the provider would have seen it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Mock implementation of [`Transport`] for testing.
///
/// Outcomes are scripted per call; once the script is exhausted every further
/// call succeeds. Accepted emails are recorded for assertions.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
    sent: Arc<Mutex<Vec<SentEmail>>>,
    notify: Arc<Notify>,
}

impl MockTransport {
    /// A transport where every send succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// A transport that follows `script` call by call, then succeeds.
    #[must_use]
    pub fn with_script(script: Vec<Result<(), TransportError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    /// A transport that fails every call with clones of `error`.
    ///
    /// # Panics
    /// Panics if the script mutex is poisoned.
    #[must_use]
    pub fn always_failing(error: TransportError) -> Self {
        let transport = Self::default();
        transport
            .script
            .lock()
            .expect("MockTransport script mutex poisoned")
            .extend(std::iter::repeat_n(Err(error), usize::from(u8::MAX)));
        transport
    }

    /// Emails accepted so far.
    ///
    /// # Panics
    /// Panics if the sent mutex is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .clone()
    }

    /// Number of emails accepted so far.
    ///
    /// # Panics
    /// Panics if the sent mutex is poisoned.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .expect("MockTransport sent mutex poisoned")
            .len()
    }

    /// Wait until at least `expected` emails have been accepted.
    ///
    /// # Errors
    /// Returns the timeout error if the count is not reached in time.
    pub async fn wait_for_count(
        &self,
        expected: usize,
        timeout: std::time::Duration,
    ) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, async {
            loop {
                if self.sent_count() >= expected {
                    return;
                }
                self.notify.notified().await;
            }
        })
        .await
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), TransportError> {
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(()));

        outcome?;

        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
                text_body: text_body.to_string(),
            });
        self.notify.notify_waiters();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let transport = MockTransport::with_script(vec![
            Err(TransportError::Connection("refused".to_string())),
            Err(TransportError::Provider("outage".to_string())),
            Ok(()),
        ]);

        assert!(transport.send("a@x.com", "s", "<p>h</p>", "h").await.is_err());
        assert!(transport.send("a@x.com", "s", "<p>h</p>", "h").await.is_err());
        assert!(transport.send("a@x.com", "s", "<p>h</p>", "h").await.is_ok());
        // Script exhausted: further sends succeed
        assert!(transport.send("a@x.com", "s", "<p>h</p>", "h").await.is_ok());

        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn accepted_emails_are_recorded() {
        let transport = MockTransport::succeeding();
        transport
            .send("g1@example.com", "Invitation", "<p>come</p>", "come")
            .await
            .expect("send should succeed");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "g1@example.com");
        assert_eq!(sent[0].subject, "Invitation");
    }
}
