//! Worker pools that turn queued jobs into delivered email.
//!
//! Two pools run side by side: [`DeliveryPool`] consumes per-guest jobs and
//! pushes them through the transport, [`SchedulerPool`] consumes deferred
//! batch jobs and fans them out into per-guest work. Both drain gracefully on
//! shutdown: in-flight jobs complete, unstarted leases lapse and are
//! redelivered on the next run.

mod config;
mod scheduled;
mod worker;

pub use config::WorkerPoolConfig;
pub use scheduled::SchedulerPool;
pub use worker::DeliveryPool;
