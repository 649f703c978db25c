//! Persistence contracts used by the pipeline and the services.
//!
//! [`postgres::PgStore`] is the production implementation,
//! [`memory::InMemoryStore`] keeps everything in process.

pub mod memory;
pub mod postgres;

use crate::entities::OrderStatus;
use crate::entities::balance_transactions::{BalanceTransaction, CreditOutcome};
use crate::entities::order_records::{CreateOutcome, OrderRecord};
use crate::utils::retry::TransientError;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("order {0} not found")]
    OrderNotFound(i64),
    #[error("order {number} is already {status}")]
    TerminalOrder { number: i64, status: OrderStatus },
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("invalid amount {0}")]
    InvalidAmount(Decimal),
}

impl TransientError for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Record a freshly uploaded order as `NEW`.
    async fn create(&self, user_id: i64, number: i64) -> Result<CreateOutcome, StoreError>;

    /// Orders of a user, newest first.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<OrderRecord>, StoreError>;

    /// Orders in `NEW` or `PROCESSING`, oldest first.
    async fn get_pending(&self) -> Result<Vec<OrderRecord>, StoreError>;

    /// Apply a forward status transition.
    ///
    /// Returns `Ok(false)` without changing anything when the order is
    /// already terminal or the transition would go backwards.
    async fn update_status(&self, number: i64, status: OrderStatus) -> Result<bool, StoreError>;

    async fn get_by_number(&self, number: i64) -> Result<OrderRecord, StoreError>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Atomically mark the order `PROCESSED` and append its credit.
    /// Replays return [`CreditOutcome::AlreadyCredited`].
    async fn credit_once(&self, number: i64, amount: Decimal)
    -> Result<CreditOutcome, StoreError>;

    async fn balance(&self, user_id: i64) -> Result<Decimal, StoreError>;

    async fn withdrawn(&self, user_id: i64) -> Result<Decimal, StoreError>;

    /// Withdrawal rows, oldest first.
    async fn withdrawals(&self, user_id: i64) -> Result<Vec<BalanceTransaction>, StoreError>;

    /// Append a withdrawal of `amount` (positive) if the balance covers it.
    async fn record_withdrawal(
        &self,
        user_id: i64,
        order_number: i64,
        amount: Decimal,
    ) -> Result<BalanceTransaction, StoreError>;
}
