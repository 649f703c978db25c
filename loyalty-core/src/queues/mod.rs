//! Bounded hand-off queues between the pipeline stages.
//!
//! # Flow
//!
//! 1. `Fetcher` pushes pending order numbers -> Unchecked Queue
//! 2. `AccrualChecker` pops them and pushes [`AccrualOutcome`]s -> Checked Queue
//! 3. `Persister` pops outcomes and writes them to the stores
//!
//! Both queues block producers when full and let consumers wait on a
//! shutdown signal. Items are not persisted: after a restart the Fetcher
//! rebuilds the Unchecked Queue from storage.

pub mod channels;
pub mod types;

pub use channels::{
    CheckedReceiver, CheckedSender, DEFAULT_QUEUE_CAPACITY, PushError, QueueReceiver,
    QueueSender, UncheckedReceiver, UncheckedSender, bounded, checked_queue, unchecked_queue,
};
pub use types::AccrualOutcome;
