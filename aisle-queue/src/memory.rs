//! In-memory queue implementation.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, warn};

use crate::{
    DeadLetter, EnqueueOptions, Job, JobId, JobQueue, LeasedJob, QueueError, RetryPolicy,
    error::Result,
};

#[derive(Debug, Clone, Copy)]
enum EntryState {
    /// Deliverable once `not_before` has passed.
    Ready { not_before: Instant },
    /// Held by one consumer; invisible to others until `expires`.
    Leased { expires: Instant },
    /// Attempts exhausted; never redelivered automatically.
    Dead,
}

#[derive(Debug, Clone)]
struct Entry {
    job: Job,
    max_attempts: u32,
    /// Delivery attempts started, counting lease expiries.
    attempts_started: u32,
    state: EntryState,
    last_error: Option<String>,
}

/// In-memory job queue with delayed delivery, lease-based dispatch, and
/// retry with exponential backoff.
///
/// Each job is delivered to exactly one consumer at a time: a leased job is
/// invisible until it is acked, nacked, or its lease lapses. A lapsed lease
/// (consumer crash or stall) consumes the attempt and the job is redelivered,
/// so execution is at-least-once.
#[derive(Debug, Clone)]
pub struct MemoryJobQueue {
    entries: Arc<DashMap<JobId, Entry>>,
    notify: Arc<Notify>,
    policy: RetryPolicy,
    lease_timeout: Duration,
    closed: Arc<AtomicBool>,
}

const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on how long a dequeue sleeps before rescanning.
const IDLE_POLL: Duration = Duration::from_secs(5);

impl MemoryJobQueue {
    /// Create a queue with the given retry policy and the default lease
    /// timeout.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_lease_timeout(policy, DEFAULT_LEASE_TIMEOUT)
    }

    /// Create a queue with an explicit lease (visibility) timeout.
    #[must_use]
    pub fn with_lease_timeout(policy: RetryPolicy, lease_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            notify: Arc::new(Notify::new()),
            policy,
            lease_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The channel's retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Try to lease one due job without waiting.
    fn try_claim(&self) -> Option<LeasedJob> {
        let now = Instant::now();

        // Collect candidates first, then re-check each under its entry lock:
        // two consumers racing for the same id resolve on the second check.
        let mut candidates: Vec<JobId> = self
            .entries
            .iter()
            .filter_map(|entry| match entry.value().state {
                EntryState::Ready { not_before } if not_before <= now => Some(*entry.key()),
                EntryState::Leased { expires } if expires <= now => Some(*entry.key()),
                _ => None,
            })
            .collect();

        // Oldest job first; ULIDs sort by creation time. Best-effort only,
        // the contract makes no cross-job ordering guarantee.
        candidates.sort_unstable();

        for id in candidates {
            let Some(mut entry) = self.entries.get_mut(&id) else {
                continue;
            };

            match entry.state {
                EntryState::Ready { not_before } if not_before <= now => {}
                EntryState::Leased { expires } if expires <= now => {
                    warn!(
                        job_id = %id,
                        attempt = entry.attempts_started,
                        "Lease expired without ack or nack, reclaiming job"
                    );
                }
                _ => continue,
            }

            if entry.attempts_started >= entry.max_attempts {
                // The final attempt's lease lapsed; nothing left to retry.
                entry.state = EntryState::Dead;
                entry
                    .last_error
                    .get_or_insert_with(|| "lease expired on final attempt".to_string());
                continue;
            }

            entry.attempts_started += 1;
            entry.state = EntryState::Leased {
                expires: now + self.lease_timeout,
            };

            return Some(LeasedJob {
                id,
                job: entry.job.clone(),
                attempt: entry.attempts_started,
            });
        }

        None
    }

    /// Earliest instant at which a currently-ineligible job becomes due.
    fn next_wake(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.value().state {
                EntryState::Ready { not_before } => Some(not_before),
                EntryState::Leased { expires } => Some(expires),
                EntryState::Dead => None,
            })
            .min()
    }
}

#[async_trait::async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: Job, opts: EnqueueOptions) -> Result<JobId> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let id = JobId::generate();
        let not_before = Instant::now() + opts.delay.unwrap_or_default();

        self.entries.insert(
            id,
            Entry {
                job,
                max_attempts: opts.max_attempts.max(1),
                attempts_started: 0,
                state: EntryState::Ready { not_before },
                last_error: None,
            },
        );

        debug!(job_id = %id, delay = ?opts.delay, "Enqueued job");
        self.notify.notify_waiters();

        Ok(id)
    }

    async fn dequeue(&self) -> Option<LeasedJob> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }

            // Register for wakeups before scanning so an enqueue between the
            // scan and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(leased) = self.try_claim() {
                return Some(leased);
            }

            let wake = self
                .next_wake()
                .unwrap_or_else(|| Instant::now() + IDLE_POLL);

            tokio::select! {
                () = &mut notified => {}
                () = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn ack(&self, id: &JobId) -> Result<()> {
        self.entries
            .remove(id)
            .map(|_| ())
            .ok_or(QueueError::NotFound(*id))
    }

    async fn nack(&self, id: &JobId, error: &str) -> Result<()> {
        let mut entry = self.entries.get_mut(id).ok_or(QueueError::NotFound(*id))?;

        entry.last_error = Some(error.to_string());

        if RetryPolicy::should_retry(entry.attempts_started, entry.max_attempts) {
            let delay = self.policy.delay_after_attempt(entry.attempts_started);
            entry.state = EntryState::Ready {
                not_before: Instant::now() + delay,
            };
            debug!(
                job_id = %id,
                attempt = entry.attempts_started,
                retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Job failed, scheduled for redelivery with backoff"
            );
        } else {
            entry.state = EntryState::Dead;
            warn!(
                job_id = %id,
                attempts = entry.attempts_started,
                error,
                "Job exhausted its attempts, parking as dead letter"
            );
        }
        drop(entry);

        self.notify.notify_waiters();

        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn dead_letters(&self) -> Vec<DeadLetter> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value().state, EntryState::Dead))
            .map(|entry| DeadLetter {
                id: *entry.key(),
                job: entry.value().job.clone(),
                attempts: entry.value().attempts_started,
                last_error: entry.value().last_error.clone(),
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry.value().state, EntryState::Dead))
            .count()
    }
}
