//! Persister processor.
//!
//! Drains the Checked Queue and makes each outcome durable:
//! - `PROCESSING` and `INVALID` only update the order status
//! - `PROCESSED` marks the order and credits its accrual in one atomic store
//!   operation; replays of an already credited order are no-ops
//!
//! Failures are logged per outcome and never stop the loop. The order stays
//! pending in storage and comes back through the Fetcher. Shutdown abandons
//! a write still waiting in its retry schedule.

use crate::entities::OrderStatus;
use crate::entities::balance_transactions::CreditOutcome;
use crate::queues::{AccrualOutcome, CheckedReceiver};
use crate::stores::{BalanceStore, OrderStore, StoreError};
use crate::utils::shutdown::cancelled;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct Persister {
    orders: Arc<dyn OrderStore>,
    balances: Arc<dyn BalanceStore>,
    checked_rx: CheckedReceiver,
    shutdown_rx: watch::Receiver<bool>,
}

impl Persister {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        balances: Arc<dyn BalanceStore>,
        checked_rx: CheckedReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            orders,
            balances,
            checked_rx,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Persister started");

        let mut cancel_rx = self.shutdown_rx.clone();
        while let Some(outcome) = self.checked_rx.pop(&mut self.shutdown_rx).await {
            let result = tokio::select! {
                biased;

                _ = cancelled(&mut cancel_rx) => {
                    info!(order = outcome.number, "Persister received shutdown signal");
                    break;
                }

                result = self.persist(outcome) => result,
            };
            if let Err(e) = result {
                error!(
                    order = outcome.number,
                    status = %outcome.status,
                    error = %e,
                    "Failed to persist accrual outcome"
                );
            }
        }

        info!("Persister shutdown complete");
    }

    pub async fn persist(&self, outcome: AccrualOutcome) -> Result<(), StoreError> {
        let AccrualOutcome {
            number,
            status,
            accrual,
        } = outcome;

        match status {
            OrderStatus::Processed => match self.balances.credit_once(number, accrual).await? {
                CreditOutcome::Credited { user_id } => {
                    info!(order = number, user = user_id, %accrual, "Order processed, balance credited");
                }
                CreditOutcome::AlreadyCredited => {
                    debug!(order = number, "Order already credited");
                }
            },
            OrderStatus::Processing | OrderStatus::Invalid => {
                if self.orders.update_status(number, status).await? {
                    debug!(order = number, %status, "Order status updated");
                } else {
                    debug!(order = number, %status, "Order already final, status kept");
                }
            }
            OrderStatus::New => {
                warn!(order = number, "Ignoring outcome without progress");
            }
        }
        Ok(())
    }
}
