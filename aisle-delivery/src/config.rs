//! Worker pool configuration.

use serde::Deserialize;

fn default_workers() -> usize {
    num_cpus::get()
}

const fn default_send_timeout() -> u64 {
    30
}

/// Tunables for a single worker pool.
///
/// The delivery channel typically runs many workers (per-guest sends are
/// independent and provider-bound), while one or two suffice for the
/// scheduled channel, whose jobs are fan-outs rather than network calls.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    ///
    /// Default: the number of CPUs
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Time budget for a single transport send (in seconds). An attempt that
    /// exceeds it counts as a failed attempt.
    ///
    /// Default: 30 seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

impl WorkerPoolConfig {
    /// A pool with a fixed worker count and the default send timeout.
    #[must_use]
    pub const fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            send_timeout_secs: default_send_timeout(),
        }
    }

    /// The default sizing for the scheduled channel: two workers, since
    /// fan-out jobs are bursts of queue writes rather than network calls.
    #[must_use]
    pub const fn scheduler_default() -> Self {
        Self::with_workers(2)
    }
}
