//! Retry policy with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for a queue channel.
///
/// The delay before redelivering a failed job is
/// `min(base * 2^(attempt - 1), max) * (1 ± jitter)`. Jitter prevents
/// thundering-herd redelivery when many jobs fail together (e.g. a provider
/// outage failing a whole batch at once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Default total delivery attempts for jobs that don't specify their own.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in seconds).
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::base_delay_secs")]
    pub base_delay_secs: u64,

    /// Cap on the backoff delay (in seconds).
    ///
    /// Default: 3600 seconds (1 hour)
    #[serde(default = "defaults::max_delay_secs")]
    pub max_delay_secs: u64,

    /// Jitter factor for randomizing delays (±fraction).
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_secs: defaults::base_delay_secs(),
            max_delay_secs: defaults::max_delay_secs(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts_made` attempts
    /// against a per-job limit of `max_attempts`.
    #[must_use]
    pub const fn should_retry(attempts_made: u32, max_attempts: u32) -> bool {
        attempts_made < max_attempts
    }

    /// Backoff delay before the retry that follows attempt number `attempt`
    /// (1-indexed).
    #[must_use]
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay_secs,
            self.max_delay_secs,
            self.jitter_factor,
        )
    }
}

/// Calculate an exponential backoff delay with jitter.
///
/// # Formula
/// `delay = min(base * 2^(attempt - 1), max_delay) * (1 ± jitter)`
#[must_use]
pub fn calculate_backoff(
    attempt: u32,
    base_delay_secs: u64,
    max_delay_secs: u64,
    jitter_factor: f64,
) -> Duration {
    // Use saturating operations to prevent overflow
    let exponent = attempt.saturating_sub(1);
    let delay = if exponent >= 63 {
        max_delay_secs
    } else {
        let multiplier = 1u64 << exponent; // 2^exponent
        base_delay_secs
            .saturating_mul(multiplier)
            .min(max_delay_secs)
    };

    // Apply jitter: delay * (1 ± jitter_factor)
    // Intentional precision loss and casting for randomization
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered_ms = {
        let delay_ms = delay.saturating_mul(1000);
        let jitter_range = (delay_ms as f64) * jitter_factor;
        if jitter_range > 0.0 {
            let mut rng = rand::rng();
            let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
            ((delay_ms as f64) + jitter).max(0.0) as u64
        } else {
            delay_ms
        }
    };

    Duration::from_millis(jittered_ms)
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_secs() -> u64 {
        30
    }

    pub const fn max_delay_secs() -> u64 {
        3600 // 1 hour
    }

    pub const fn jitter_factor() -> f64 {
        0.1 // ±10%
    }
}
