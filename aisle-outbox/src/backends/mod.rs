//! Backing store implementations for the outbox.
//!
//! Currently only `memory` is provided; the [`crate::OutboxStore`] trait is
//! the seam a database-backed store implements.

pub mod memory;

pub use memory::MemoryOutboxStore;
