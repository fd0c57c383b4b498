//! Typed transport failures.
//!
//! The variants record why the provider refused; every failure feeds the
//! same retry policy, and the display text lands on the outbox row as the
//! last error message.

use thiserror::Error;

/// A delivery attempt the transport did not accept.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The recipient address was rejected.
    #[error("Recipient rejected: {0}")]
    Rejected(String),

    /// Could not reach the provider.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The provider reported an internal error or outage.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The attempt exceeded its time budget.
    #[error("Send timed out after {0} seconds")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = TransportError::Provider("rate limit".to_string());
        assert_eq!(err.to_string(), "Provider error: rate limit");
    }
}
