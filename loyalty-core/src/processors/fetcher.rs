//! Fetcher processor.
//!
//! Periodically scans the order store for orders that still wait for an
//! accrual result (`NEW` or `PROCESSING`) and feeds their numbers into the
//! Unchecked Queue. Scans are at least `scan_interval` apart; when the queue
//! is full the scan waits for the Accrual Checker to catch up.
//!
//! The Fetcher does not deduplicate: an order still pending on the next scan
//! is pushed again. This is what retries lookups that were dropped
//! downstream.
//!
//! A scan is raced against shutdown, so a store call stuck in its retry
//! schedule is dropped as soon as the signal arrives.

use crate::config::FetcherConfig;
use crate::queues::{PushError, UncheckedSender};
use crate::stores::{OrderStore, StoreError};
use crate::utils::shutdown::cancelled;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to load pending orders: {0}")]
    Store(#[from] StoreError),

    #[error("unchecked queue unavailable: {0}")]
    Queue(#[from] PushError),

    #[error("scan cancelled by shutdown")]
    Cancelled,
}

/// Lower bound for `scan_interval`; a zero period would make the ticker panic.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_millis(10);

pub struct Fetcher {
    orders: Arc<dyn OrderStore>,
    unchecked_tx: UncheckedSender,
    shutdown_rx: watch::Receiver<bool>,
    scan_interval: Duration,
}

impl Fetcher {
    pub fn new(
        config: FetcherConfig,
        orders: Arc<dyn OrderStore>,
        unchecked_tx: UncheckedSender,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            orders,
            unchecked_tx,
            shutdown_rx,
            scan_interval: config.scan_interval.max(MIN_SCAN_INTERVAL),
        }
    }

    pub async fn run(mut self) {
        info!(scan_interval = ?self.scan_interval, "Fetcher started");

        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut self.shutdown_rx) => {
                    info!("Fetcher received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    match self.scan().await {
                        Ok(pushed) => debug!(pushed, "Fetcher scan complete"),
                        Err(e @ (FetchError::Queue(_) | FetchError::Cancelled)) => {
                            info!(reason = %e, "Fetcher stopping");
                            break;
                        }
                        Err(e) => error!(error = %e, "Fetcher scan failed"),
                    }
                }
            }
        }

        info!("Fetcher shutdown complete");
    }

    /// Push every pending order once. Returns how many were pushed.
    pub async fn scan(&mut self) -> Result<usize, FetchError> {
        let pending = tokio::select! {
            biased;

            _ = cancelled(&mut self.shutdown_rx) => return Err(FetchError::Cancelled),
            pending = self.orders.get_pending() => pending?,
        };
        for order in &pending {
            self.unchecked_tx
                .push(order.number, &mut self.shutdown_rx)
                .await?;
        }
        Ok(pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;
    use crate::entities::order_records::{CreateOutcome, OrderRecord};
    use crate::queues::unchecked_queue;
    use crate::stores::InMemoryStore;
    use crate::utils::retry::{RetrySchedule, retry_transient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Order store whose `get_pending` fails while `failing` is set.
    struct FailingScans {
        inner: InMemoryStore,
        failing: AtomicBool,
        fail_once: bool,
        scans: AtomicU32,
    }

    impl FailingScans {
        fn new(inner: InMemoryStore, fail_once: bool) -> Self {
            Self {
                inner,
                failing: AtomicBool::new(true),
                fail_once,
                scans: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl OrderStore for FailingScans {
        async fn create(&self, user_id: i64, number: i64) -> Result<CreateOutcome, StoreError> {
            self.inner.create(user_id, number).await
        }

        async fn list_by_user(&self, user_id: i64) -> Result<Vec<OrderRecord>, StoreError> {
            self.inner.list_by_user(user_id).await
        }

        async fn get_pending(&self) -> Result<Vec<OrderRecord>, StoreError> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if !self.failing.load(Ordering::SeqCst) {
                return self.inner.get_pending().await;
            }
            if self.fail_once {
                self.failing.store(false, Ordering::SeqCst);
                return Err(StoreError::Database(sqlx::Error::RowNotFound));
            }
            retry_transient(&RetrySchedule::default(), "GetPendingOrders", || async {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            })
            .await
        }

        async fn update_status(
            &self,
            number: i64,
            status: OrderStatus,
        ) -> Result<bool, StoreError> {
            self.inner.update_status(number, status).await
        }

        async fn get_by_number(&self, number: i64) -> Result<OrderRecord, StoreError> {
            self.inner.get_by_number(number).await
        }
    }

    #[tokio::test]
    async fn test_scan_pushes_only_pending_orders() {
        let store = InMemoryStore::new();
        store.create(1, 79927398713).await.unwrap();
        store.create(1, 12345678903).await.unwrap();
        store.create(2, 4561261212345467).await.unwrap();
        store
            .update_status(12345678903, OrderStatus::Invalid)
            .await
            .unwrap();
        store
            .update_status(4561261212345467, OrderStatus::Processing)
            .await
            .unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, mut rx) = unchecked_queue(10);
        let mut fetcher = Fetcher::new(
            FetcherConfig::default(),
            Arc::new(store),
            tx,
            shutdown_rx.clone(),
        );

        assert_eq!(fetcher.scan().await.unwrap(), 2);

        let mut shutdown_rx = shutdown_rx;
        let mut pushed = vec![
            rx.pop(&mut shutdown_rx).await.unwrap(),
            rx.pop(&mut shutdown_rx).await.unwrap(),
        ];
        pushed.sort();
        assert_eq!(pushed, vec![79927398713, 4561261212345467]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_while_queue_full() {
        let store = InMemoryStore::new();
        store.create(1, 79927398713).await.unwrap();
        store.create(1, 12345678903).await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, _rx) = unchecked_queue(1);
        let fetcher = Fetcher::new(
            FetcherConfig {
                scan_interval: Duration::from_millis(10),
            },
            Arc::new(store),
            tx,
            shutdown_rx,
        );
        let handle = tokio::spawn(fetcher.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_scan_does_not_stop_run() {
        let store = InMemoryStore::new();
        store.create(1, 79927398713).await.unwrap();
        let orders = Arc::new(FailingScans::new(store, true));

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (tx, mut rx) = unchecked_queue(4);
        let fetcher = Fetcher::new(
            FetcherConfig {
                scan_interval: Duration::from_millis(10),
            },
            orders.clone(),
            tx,
            shutdown_rx.clone(),
        );
        let handle = tokio::spawn(fetcher.run());

        let number = tokio::time::timeout(Duration::from_secs(1), rx.pop(&mut shutdown_rx))
            .await
            .unwrap();
        assert_eq!(number, Some(79927398713));
        assert!(orders.scans.load(Ordering::SeqCst) >= 2);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retrying_scan() {
        let orders = Arc::new(FailingScans::new(InMemoryStore::new(), false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, _rx) = unchecked_queue(1);
        let fetcher = Fetcher::new(FetcherConfig::default(), orders.clone(), tx, shutdown_rx);
        let handle = tokio::spawn(fetcher.run());

        // first tick fires immediately, the scan is now inside its retry schedule
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(orders.scans.load(Ordering::SeqCst), 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_scan_interval_is_clamped() {
        let store = InMemoryStore::new();
        store.create(1, 79927398713).await.unwrap();

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (tx, mut rx) = unchecked_queue(4);
        let fetcher = Fetcher::new(
            FetcherConfig {
                scan_interval: Duration::ZERO,
            },
            Arc::new(store),
            tx,
            shutdown_rx.clone(),
        );
        assert_eq!(fetcher.scan_interval, MIN_SCAN_INTERVAL);
        let handle = tokio::spawn(fetcher.run());

        assert_eq!(rx.pop(&mut shutdown_rx).await, Some(79927398713));
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
