//! Pipeline workers.
//!
//! - `Fetcher`: scans the order store, feeds the Unchecked Queue
//! - `AccrualChecker`: drains the Unchecked Queue under a rate limit, feeds the Checked Queue
//! - `Persister`: drains the Checked Queue into the order and balance stores

pub mod accrual_checker;
pub mod fetcher;
pub mod persister;

pub use accrual_checker::{AccrualChecker, AccrualSource, LookupResult, RateLimiter};
pub use fetcher::{FetchError, Fetcher};
pub use persister::Persister;

use crate::config::PipelineConfig;
use crate::queues::{checked_queue, unchecked_queue};
use crate::stores::{BalanceStore, OrderStore};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handles of the three running workers.
pub struct Pipeline {
    fetcher: JoinHandle<()>,
    accrual_checker: JoinHandle<()>,
    persister: JoinHandle<()>,
}

impl Pipeline {
    /// Create both queues and spawn every worker on the current runtime.
    ///
    /// Workers run until `shutdown_rx` turns `true` or its sender is dropped.
    pub fn spawn(
        config: &PipelineConfig,
        orders: Arc<dyn OrderStore>,
        balances: Arc<dyn BalanceStore>,
        source: Arc<dyn AccrualSource>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (unchecked_tx, unchecked_rx) = unchecked_queue(config.queue_capacity);
        let (checked_tx, checked_rx) = checked_queue(config.queue_capacity);

        let fetcher = Fetcher::new(
            config.fetcher,
            orders.clone(),
            unchecked_tx,
            shutdown_rx.clone(),
        );
        let accrual_checker = AccrualChecker::new(
            config.accrual,
            source,
            unchecked_rx,
            checked_tx,
            shutdown_rx.clone(),
        );
        let persister = Persister::new(orders, balances, checked_rx, shutdown_rx);

        info!(queue_capacity = config.queue_capacity, "Spawning accrual pipeline");

        Self {
            fetcher: tokio::spawn(fetcher.run()),
            accrual_checker: tokio::spawn(accrual_checker.run()),
            persister: tokio::spawn(persister.run()),
        }
    }

    /// Wait for every worker to finish.
    pub async fn join(self) {
        let (fetcher, accrual_checker, persister) =
            tokio::join!(self.fetcher, self.accrual_checker, self.persister);
        for (name, result) in [
            ("Fetcher", fetcher),
            ("AccrualChecker", accrual_checker),
            ("Persister", persister),
        ] {
            if let Err(e) = result {
                error!(worker = name, error = %e, "Worker task failed");
            }
        }
        info!("Accrual pipeline stopped");
    }
}
