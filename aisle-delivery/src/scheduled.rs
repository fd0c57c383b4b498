//! The scheduler pool: deferred batch jobs to per-guest work.

use std::sync::Arc;

use aisle_common::Signal;
use aisle_producer::{JobProducer, ProducerError};
use aisle_queue::{Job, JobId, JobQueue, LeasedJob, ScheduledEmailJob};
use tokio::{sync::broadcast, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::WorkerPoolConfig;

/// Workers draining the scheduled channel.
///
/// A job here is a whole batch: when it fires, the producer fans it out into
/// fresh outbox rows and per-guest delivery jobs. Fan-out is local work, so
/// a small pool suffices.
#[derive(Debug)]
pub struct SchedulerPool {
    queue: Arc<dyn JobQueue>,
    producer: Arc<JobProducer>,
    config: WorkerPoolConfig,
}

impl SchedulerPool {
    #[must_use]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        producer: Arc<JobProducer>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            queue,
            producer,
            config,
        }
    }

    /// Run the pool until shutdown is signalled or the queue closes.
    pub async fn serve(self: Arc<Self>, shutdown: broadcast::Sender<Signal>) {
        let workers = self.config.workers.max(1);
        info!(workers, "Scheduler pool starting");

        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            let pool = Arc::clone(&self);
            let shutdown = shutdown.subscribe();
            tasks.spawn(async move { pool.worker_loop(worker, shutdown).await });
        }

        while tasks.join_next().await.is_some() {}
        info!("Scheduler pool stopped");
    }

    async fn worker_loop(&self, worker: usize, mut shutdown: broadcast::Receiver<Signal>) {
        debug!(worker, "Scheduler worker started");

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) => {
                            debug!(worker, "Scheduler worker received shutdown signal");
                        }
                        Err(e) => {
                            debug!(worker, error = %e, "Scheduler worker shutdown channel closed");
                        }
                    }
                    break;
                }
                leased = self.queue.dequeue() => {
                    let Some(leased) = leased else {
                        debug!(worker, "Queue closed, scheduler worker draining out");
                        break;
                    };
                    self.handle(leased).await;
                }
            }
        }

        debug!(worker, "Scheduler worker stopped");
    }

    async fn handle(&self, leased: LeasedJob) {
        match &leased.job {
            Job::Scheduled(job) => self.fan_out(leased.id, leased.attempt, job).await,
            Job::Reminder(_) => {
                warn!(job_id = %leased.id, "Per-guest job on the scheduled channel, discarding");
                self.ack(&leased.id).await;
            }
        }
    }

    async fn fan_out(&self, job_id: JobId, attempt: u32, job: &ScheduledEmailJob) {
        match self.producer.fan_out(job).await {
            Ok(outcome) => {
                info!(
                    %job_id,
                    wedding_id = %job.wedding_id,
                    queued = outcome.queued,
                    total = outcome.total,
                    "Scheduled batch fanned out"
                );
                self.ack(&job_id).await;
            }
            // The wedding changed since scheduling; there is nothing to send
            // and retrying cannot change that.
            Err(
                e @ (ProducerError::FeatureDisabled { .. } | ProducerError::NoGuestsSelected(_)),
            ) => {
                info!(%job_id, reason = %e, "Dropping scheduled batch");
                self.ack(&job_id).await;
            }
            Err(e) => {
                // Fan-out fails before any row is created, so redelivery
                // cannot duplicate rows.
                error!(%job_id, attempt, error = %e, "Fan-out failed, will retry");
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
