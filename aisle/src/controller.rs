use std::sync::{Arc, LazyLock};

use aisle_common::{Signal, internal, logging};
use aisle_delivery::{DeliveryPool, SchedulerPool, WorkerPoolConfig};
use aisle_outbox::{MemoryOutboxStore, StoreReconciler};
use aisle_producer::{
    JobProducer, MemoryGuestDirectory, ProducerConfig, ProducerDeps, StockTemplates,
};
use aisle_queue::{JobQueue, MemoryJobQueue, RetryPolicy};
use aisle_transport::LogTransport;
use serde::Deserialize;
use tokio::sync::broadcast;

/// The whole service, as read from the configuration file.
///
/// Every section is optional; an empty file runs with defaults.
#[derive(Debug, Deserialize)]
pub struct Aisle {
    /// Producer settings.
    #[serde(default)]
    producer: ProducerConfig,

    /// Retry policy shared by both queue channels.
    #[serde(default)]
    retry: RetryPolicy,

    /// The per-guest delivery pool.
    #[serde(default)]
    delivery: WorkerPoolConfig,

    /// The scheduled (batch fan-out) pool. Sized down by default; its jobs
    /// expand into per-guest work rather than doing the sends themselves.
    #[serde(default = "WorkerPoolConfig::scheduler_default")]
    scheduler: WorkerPoolConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown(
    reminder_queue: &MemoryJobQueue,
    scheduled_queue: &MemoryJobQueue,
) -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!("Terminate signal received, shutting down");
        }
    };

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    // Closing the channels lets workers drain out instead of parking on an
    // empty dequeue.
    reminder_queue.close();
    scheduled_queue.close();

    Ok(())
}

impl Aisle {
    /// Run the service until a shutdown signal arrives.
    ///
    /// # Errors
    /// Returns an error if signal handlers cannot be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        internal!("Aisle controller running");

        let store = Arc::new(MemoryOutboxStore::new());
        let directory = Arc::new(MemoryGuestDirectory::new());
        let reminder_queue = Arc::new(MemoryJobQueue::new(self.retry.clone()));
        let scheduled_queue = Arc::new(MemoryJobQueue::new(self.retry));
        let transport = Arc::new(LogTransport);

        let producer = Arc::new(JobProducer::new(
            ProducerDeps {
                store: store.clone(),
                reminder_queue: reminder_queue.clone(),
                scheduled_queue: scheduled_queue.clone(),
                directory,
                templates: Arc::new(StockTemplates),
                transport: transport.clone(),
                reconciler: Arc::new(StoreReconciler::new(store.clone())),
            },
            self.producer,
        ));

        let delivery_pool = Arc::new(DeliveryPool::new(
            reminder_queue.clone(),
            store.clone(),
            transport,
            Arc::new(StoreReconciler::new(store)),
            self.delivery,
        ));
        let scheduler_pool = Arc::new(SchedulerPool::new(
            scheduled_queue.clone(),
            producer,
            self.scheduler,
        ));

        let ret = tokio::select! {
            () = delivery_pool.serve(SHUTDOWN_BROADCAST.clone()) => Ok(()),
            () = scheduler_pool.serve(SHUTDOWN_BROADCAST.clone()) => Ok(()),
            r = shutdown(&reminder_queue, &scheduled_queue) => r,
        };

        internal!("Shutting down...");

        ret
    }
}
