use super::types::AccrualOutcome;
use crate::utils::shutdown::cancelled;
use tokio::sync::{mpsc, watch};

/// Default capacity of both pipeline queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("shutdown requested while waiting for queue space")]
    Cancelled,
    #[error("queue consumer is gone")]
    Closed,
}

/// Producer side of a bounded FIFO queue.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Consumer side of a bounded FIFO queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<T>,
}

/// Create a queue holding at most `capacity` items (at least one).
pub fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueSender { tx }, QueueReceiver { rx })
}

impl<T> QueueSender<T> {
    /// Enqueue `item`, waiting for a free slot when the queue is full.
    ///
    /// The wait ends early when shutdown is signalled; the item is then
    /// dropped and never enqueued.
    pub async fn push(
        &self,
        item: T,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), PushError> {
        tokio::select! {
            biased;
            _ = cancelled(shutdown_rx) => Err(PushError::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| PushError::Closed),
        }
    }

    /// Number of items currently queued.
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl<T> QueueReceiver<T> {
    /// Dequeue the oldest item, waiting until one is available.
    ///
    /// Returns `None` without consuming anything once shutdown is signalled,
    /// or when every sender is gone and the queue is drained.
    pub async fn pop(&mut self, shutdown_rx: &mut watch::Receiver<bool>) -> Option<T> {
        tokio::select! {
            biased;
            _ = cancelled(shutdown_rx) => None,
            item = self.rx.recv() => item,
        }
    }
}

/// Order numbers awaiting an accrual lookup.
pub type UncheckedSender = QueueSender<i64>;
pub type UncheckedReceiver = QueueReceiver<i64>;

/// Accrual results awaiting persistence.
pub type CheckedSender = QueueSender<AccrualOutcome>;
pub type CheckedReceiver = QueueReceiver<AccrualOutcome>;

pub fn unchecked_queue(capacity: usize) -> (UncheckedSender, UncheckedReceiver) {
    bounded(capacity)
}

pub fn checked_queue(capacity: usize) -> (CheckedSender, CheckedReceiver) {
    bounded(capacity)
}
