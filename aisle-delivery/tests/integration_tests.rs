//! End-to-end tests: producer, queue, worker pools, and outbox together.

use std::{sync::Arc, time::Duration};

use aisle_common::{Signal, email::EmailType, ids::GuestId};
use aisle_delivery::{DeliveryPool, SchedulerPool, WorkerPoolConfig};
use aisle_outbox::{
    MemoryOutboxStore, NewOutboxRecord, OutboxStatus, OutboxStore, StoreReconciler,
};
use aisle_producer::{
    JobProducer, MemoryGuestDirectory, ProducerConfig, ProducerDeps, RsvpStatus, StockTemplates,
    WeddingConfig,
};
use aisle_queue::{
    EnqueueOptions, Job, JobQueue, MemoryJobQueue, ReminderJob, RetryPolicy,
};
use aisle_transport::{MockTransport, TransportError};
use chrono::Utc;
use tokio::{sync::broadcast, task::JoinHandle};

/// A retry policy with no backoff, so exhaustion tests finish quickly.
fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_secs: 0,
        max_delay_secs: 1,
        jitter_factor: 0.0,
    }
}

struct World {
    store: Arc<MemoryOutboxStore>,
    reminder_queue: Arc<MemoryJobQueue>,
    scheduled_queue: Arc<MemoryJobQueue>,
    directory: Arc<MemoryGuestDirectory>,
    transport: Arc<MockTransport>,
    producer: Arc<JobProducer>,
    shutdown: broadcast::Sender<Signal>,
}

impl World {
    fn new(transport: MockTransport, policy: RetryPolicy) -> Self {
        let store = Arc::new(MemoryOutboxStore::new());
        let reminder_queue = Arc::new(MemoryJobQueue::new(policy.clone()));
        let scheduled_queue = Arc::new(MemoryJobQueue::new(policy));
        let directory = Arc::new(MemoryGuestDirectory::new());
        let transport = Arc::new(transport);
        let reconciler = Arc::new(StoreReconciler::new(store.clone()));

        let producer = Arc::new(JobProducer::new(
            ProducerDeps {
                store: store.clone(),
                reminder_queue: reminder_queue.clone(),
                scheduled_queue: scheduled_queue.clone(),
                directory: directory.clone(),
                templates: Arc::new(StockTemplates),
                transport: transport.clone(),
                reconciler,
            },
            ProducerConfig::default(),
        ));

        let (shutdown, _) = broadcast::channel(1);

        Self {
            store,
            reminder_queue,
            scheduled_queue,
            directory,
            transport,
            producer,
            shutdown,
        }
    }

    fn spawn_delivery_pool(&self, workers: usize) -> JoinHandle<()> {
        let pool = Arc::new(DeliveryPool::new(
            self.reminder_queue.clone(),
            self.store.clone(),
            self.transport.clone(),
            Arc::new(StoreReconciler::new(self.store.clone())),
            WorkerPoolConfig::with_workers(workers),
        ));
        tokio::spawn(pool.serve(self.shutdown.clone()))
    }

    fn spawn_scheduler_pool(&self) -> JoinHandle<()> {
        let pool = Arc::new(SchedulerPool::new(
            self.scheduled_queue.clone(),
            self.producer.clone(),
            WorkerPoolConfig::with_workers(1),
        ));
        tokio::spawn(pool.serve(self.shutdown.clone()))
    }
}

/// Wait for the queue to drain (acked or dead-lettered), then close it and
/// join the pool.
async fn drain(queue: &MemoryJobQueue, pool: JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue did not drain in time");

    queue.close();
    pool.await.expect("pool task panicked");
}

#[tokio::test]
async fn queued_reminders_end_as_sent_records() {
    let world = World::new(MockTransport::succeeding(), fast_policy());
    let wedding = world.directory.add_wedding(WeddingConfig::default());
    world
        .directory
        .add_guest(wedding, "Ada", "ada@example.com", RsvpStatus::Pending);
    world
        .directory
        .add_guest(wedding, "Ben", "ben@example.com", RsvpStatus::Pending);

    world.producer.send_reminders(wedding, None).await.unwrap();
    let pool = world.spawn_delivery_pool(2);
    drain(&world.reminder_queue, pool).await;

    let records = world.store.list_for_wedding(&wedding).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.status, OutboxStatus::Sent);
        assert_eq!(record.attempts, 1);
        assert!(record.sent_at.is_some());
        assert_eq!(record.error_message, None);
    }
    assert_eq!(world.transport.sent_count(), 2);
    assert!(world.reminder_queue.dead_letters().is_empty());
}

#[tokio::test]
async fn temporary_failures_are_retried_until_success() {
    let world = World::new(
        MockTransport::with_script(vec![
            Err(TransportError::Connection("refused".to_string())),
            Err(TransportError::Provider("rate limit".to_string())),
            Ok(()),
        ]),
        fast_policy(),
    );
    let wedding = world.directory.add_wedding(WeddingConfig::default());
    world
        .directory
        .add_guest(wedding, "Ada", "ada@example.com", RsvpStatus::Pending);

    world.producer.send_reminders(wedding, None).await.unwrap();
    let pool = world.spawn_delivery_pool(1);
    drain(&world.reminder_queue, pool).await;

    let records = world.store.list_for_wedding(&wedding).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, OutboxStatus::Sent);
    assert_eq!(record.attempts, 3, "two failed attempts plus the success");
    assert!(record.sent_at.is_some());
    assert_eq!(record.error_message, None, "success clears the last error");
    assert_eq!(world.transport.sent_count(), 1);
    assert!(world.reminder_queue.dead_letters().is_empty());
}

#[tokio::test]
async fn exhausted_attempts_park_the_job_and_fail_the_record() {
    let world = World::new(
        MockTransport::always_failing(TransportError::Connection("refused".to_string())),
        fast_policy(),
    );
    let wedding = world.directory.add_wedding(WeddingConfig::default());
    world
        .directory
        .add_guest(wedding, "Ada", "ada@example.com", RsvpStatus::Pending);

    world.producer.send_reminders(wedding, None).await.unwrap();
    let pool = world.spawn_delivery_pool(1);
    drain(&world.reminder_queue, pool).await;

    let records = world.store.list_for_wedding(&wedding).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, OutboxStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert_eq!(record.sent_at, None);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Connection failed: refused")
    );
    assert_eq!(world.transport.sent_count(), 0);

    let dead = world.reminder_queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].attempts, 3);
    assert_eq!(
        dead[0].last_error.as_deref(),
        Some("Connection failed: refused")
    );
}

#[tokio::test]
async fn rejected_addresses_follow_the_retry_policy() {
    let world = World::new(
        MockTransport::always_failing(TransportError::Rejected("no such mailbox".to_string())),
        fast_policy(),
    );
    let wedding = world.directory.add_wedding(WeddingConfig::default());
    world
        .directory
        .add_guest(wedding, "Ada", "ada@example.com", RsvpStatus::Pending);

    world.producer.send_reminders(wedding, None).await.unwrap();
    let pool = world.spawn_delivery_pool(1);
    drain(&world.reminder_queue, pool).await;

    let records = world.store.list_for_wedding(&wedding).await.unwrap();
    let record = &records[0];
    assert_eq!(record.status, OutboxStatus::Failed);
    assert_eq!(record.attempts, 3, "rejections retry like any other failure");
    assert_eq!(
        record.error_message.as_deref(),
        Some("Recipient rejected: no such mailbox")
    );
    // Parked after the final attempt; a manual resend stays possible.
    assert_eq!(world.reminder_queue.dead_letters().len(), 1);
}

#[tokio::test]
async fn scheduled_batch_fans_out_and_delivers() {
    let world = World::new(MockTransport::succeeding(), fast_policy());
    let wedding = world.directory.add_wedding(WeddingConfig::default());
    let guests: Vec<GuestId> = vec![
        world
            .directory
            .add_guest(wedding, "Ada", "ada@example.com", RsvpStatus::Pending),
        world
            .directory
            .add_guest(wedding, "Ben", "ben@example.com", RsvpStatus::Attending),
    ];

    world
        .producer
        .schedule_email(
            wedding,
            guests,
            EmailType::Reminder,
            Utc::now() + chrono::Duration::milliseconds(100),
        )
        .await
        .unwrap();

    // No rows and no per-guest jobs exist until the batch fires.
    assert!(world.store.is_empty());
    assert!(world.reminder_queue.is_empty());

    let scheduler = world.spawn_scheduler_pool();
    let delivery = world.spawn_delivery_pool(2);

    world
        .transport
        .wait_for_count(2, Duration::from_secs(10))
        .await
        .expect("scheduled emails were not delivered in time");

    drain(&world.scheduled_queue, scheduler).await;
    drain(&world.reminder_queue, delivery).await;

    let records = world.store.list_for_wedding(&wedding).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.status, OutboxStatus::Sent);
        assert_eq!(record.email_type, EmailType::Reminder);
    }
}

#[tokio::test]
async fn duplicate_delivery_does_not_regress_a_sent_record() {
    let world = World::new(MockTransport::succeeding(), fast_policy());
    let wedding = world.directory.add_wedding(WeddingConfig::default());
    let guest = world
        .directory
        .add_guest(wedding, "Ada", "ada@example.com", RsvpStatus::Pending);

    // Two jobs for the same row, as a crashed worker's redelivery would
    // produce.
    let record_id = world
        .store
        .create(NewOutboxRecord {
            wedding_id: wedding,
            guest_id: guest,
            email_type: EmailType::Reminder,
            to_email: "ada@example.com".to_string(),
            to_name: "Ada".to_string(),
            subject: "Reminder".to_string(),
        })
        .await
        .unwrap();
    for _ in 0..2 {
        world
            .reminder_queue
            .enqueue(
                Job::Reminder(ReminderJob {
                    record_id,
                    html_body: "<p>hi</p>".to_string(),
                    text_body: "hi".to_string(),
                }),
                EnqueueOptions::immediate(3),
            )
            .await
            .unwrap();
    }

    let pool = world.spawn_delivery_pool(2);
    drain(&world.reminder_queue, pool).await;

    // Both emails go out (at-least-once), but the row settles once.
    assert_eq!(world.transport.sent_count(), 2);
    let record = world.store.get(&record_id).await.unwrap();
    assert_eq!(record.status, OutboxStatus::Sent);
    assert_eq!(record.attempts, 1, "the duplicate report is a no-op");
}

#[tokio::test]
async fn shutdown_signal_stops_the_pool() {
    let world = World::new(MockTransport::succeeding(), fast_policy());
    let pool = world.spawn_delivery_pool(2);

    // Give workers a moment to subscribe and park on an empty queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    world
        .shutdown
        .send(Signal::Shutdown)
        .expect("workers should be subscribed");

    tokio::time::timeout(Duration::from_secs(5), pool)
        .await
        .expect("pool did not stop after shutdown signal")
        .expect("pool task panicked");
}
