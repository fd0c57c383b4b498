//! The delivery pool: per-guest jobs to transport sends.

use std::{sync::Arc, time::Duration};

use aisle_common::Signal;
use aisle_outbox::{AttemptOutcome, OutboxError, OutboxStore, StatusReconciler};
use aisle_queue::{Job, JobId, JobQueue, LeasedJob, ReminderJob};
use aisle_transport::{Transport, TransportError};
use tokio::{sync::broadcast, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::WorkerPoolConfig;

/// A pool of workers draining the per-guest delivery channel.
///
/// Each job is one email: the worker loads the outbox row for the recipient
/// snapshot, sends through the transport under a timeout, reports the
/// attempt's outcome to the store, and only then settles the job with the
/// queue. Reporting before settling means a crash between the two causes a
/// redelivery, never a lost outcome; the store's sent-wins rule absorbs the
/// duplicate report.
#[derive(Debug)]
pub struct DeliveryPool {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn OutboxStore>,
    transport: Arc<dyn Transport>,
    reconciler: Arc<dyn StatusReconciler>,
    config: WorkerPoolConfig,
}

impl DeliveryPool {
    #[must_use]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn OutboxStore>,
        transport: Arc<dyn Transport>,
        reconciler: Arc<dyn StatusReconciler>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            queue,
            store,
            transport,
            reconciler,
            config,
        }
    }

    /// Run the pool until shutdown is signalled or the queue closes.
    ///
    /// Workers finish the job they hold before exiting; leased jobs they
    /// never started are reclaimed by the queue after the lease lapses.
    pub async fn serve(self: Arc<Self>, shutdown: broadcast::Sender<Signal>) {
        let workers = self.config.workers.max(1);
        info!(workers, "Delivery pool starting");

        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            let pool = Arc::clone(&self);
            let shutdown = shutdown.subscribe();
            tasks.spawn(async move { pool.worker_loop(worker, shutdown).await });
        }

        while tasks.join_next().await.is_some() {}
        info!("Delivery pool stopped");
    }

    async fn worker_loop(&self, worker: usize, mut shutdown: broadcast::Receiver<Signal>) {
        debug!(worker, "Delivery worker started");

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) => {
                            debug!(worker, "Delivery worker received shutdown signal");
                        }
                        Err(e) => {
                            debug!(worker, error = %e, "Delivery worker shutdown channel closed");
                        }
                    }
                    break;
                }
                leased = self.queue.dequeue() => {
                    let Some(leased) = leased else {
                        debug!(worker, "Queue closed, delivery worker draining out");
                        break;
                    };
                    self.handle(leased).await;
                }
            }
        }

        debug!(worker, "Delivery worker stopped");
    }

    async fn handle(&self, leased: LeasedJob) {
        match &leased.job {
            Job::Reminder(job) => self.deliver(leased.id, leased.attempt, job).await,
            Job::Scheduled(_) => {
                // This channel only carries per-guest jobs.
                warn!(job_id = %leased.id, "Batch job on the delivery channel, discarding");
                self.ack(&leased.id).await;
            }
        }
    }

    /// One delivery attempt for one email.
    async fn deliver(&self, job_id: JobId, attempt: u32, job: &ReminderJob) {
        let record = match self.store.get(&job.record_id).await {
            Ok(record) => record,
            Err(OutboxError::NotFound(record_id)) => {
                warn!(%job_id, %record_id, "Job references a missing outbox row, discarding");
                self.ack(&job_id).await;
                return;
            }
            Err(e) => {
                error!(%job_id, error = %e, "Failed to load outbox row, will retry");
                self.nack(&job_id, &e.to_string()).await;
                return;
            }
        };

        let timeout = Duration::from_secs(self.config.send_timeout_secs);
        let send = self.transport.send(
            &record.to_email,
            &record.subject,
            &job.html_body,
            &job.text_body,
        );
        let outcome = match tokio::time::timeout(timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.config.send_timeout_secs)),
        };

        match outcome {
            Ok(()) => {
                info!(
                    %job_id,
                    record_id = %job.record_id,
                    attempt,
                    to = %record.to_email,
                    "Email delivered"
                );
                if let Err(e) = self
                    .reconciler
                    .report(&job.record_id, AttemptOutcome::Sent)
                    .await
                {
                    // The email went out; the row stays behind reality until
                    // a later report lands.
                    error!(record_id = %job.record_id, error = %e, "Delivered but could not record it");
                }
                self.ack(&job_id).await;
            }
            Err(e) => {
                warn!(
                    %job_id,
                    record_id = %job.record_id,
                    attempt,
                    error = %e,
                    "Delivery attempt failed"
                );
                if let Err(report_err) = self
                    .reconciler
                    .report(&job.record_id, AttemptOutcome::Failed(e.to_string()))
                    .await
                {
                    error!(record_id = %job.record_id, error = %report_err, "Could not record failed attempt");
                }

                // Every failure follows the queue's retry policy; jobs that
                // never succeed are parked after the final attempt and the
                // row stays Failed, open to a manual resend.
                self.nack(&job_id, &e.to_string()).await;
            }
        }
    }

    async fn ack(&self, job_id: &JobId) {
        if let Err(e) = self.queue.ack(job_id).await {
            warn!(%job_id, error = %e, "Ack failed, job may be redelivered");
        }
    }

    async fn nack(&self, job_id: &JobId, error: &str) {
        if let Err(e) = self.queue.nack(job_id, error).await {
            warn!(%job_id, error = %e, "Nack failed, job may be redelivered");
        }
    }
}
