use crate::entities::OrderStatus;
use crate::entities::balance_transactions::{
    BalanceTransaction, CreditOrderOnce, CreditOutcome, GetUserBalance, GetUserWithdrawals,
    GetUserWithdrawn, RecordWithdrawal,
};
use crate::entities::order_records::{
    CreateOutcome, GetOrderByNumber, GetOrdersByUser, GetPendingOrders, InsertOrder, OrderRecord,
    UpdateOrderStatus,
};
use crate::framework::DatabaseProcessor;
use crate::stores::{BalanceStore, OrderStore, StoreError};
use crate::utils::retry::{RetrySchedule, retry_transient};
use async_trait::async_trait;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// PostgreSQL-backed order and balance store.
///
/// Every query is retried on transient connection errors according to
/// `retry`.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
    retry: RetrySchedule,
}

impl PgStore {
    pub fn new(pool: PgPool, retry: RetrySchedule) -> Self {
        Self {
            db: DatabaseProcessor { pool },
            retry,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create(&self, user_id: i64, number: i64) -> Result<CreateOutcome, StoreError> {
        let query = InsertOrder { number, user_id };
        Ok(retry_transient(&self.retry, "InsertOrder", || self.db.process(query.clone())).await?)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<OrderRecord>, StoreError> {
        let query = GetOrdersByUser { user_id };
        Ok(
            retry_transient(&self.retry, "GetOrdersByUser", || {
                self.db.process(query.clone())
            })
            .await?,
        )
    }

    async fn get_pending(&self) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(
            retry_transient(&self.retry, "GetPendingOrders", || {
                self.db.process(GetPendingOrders)
            })
            .await?,
        )
    }

    async fn update_status(&self, number: i64, status: OrderStatus) -> Result<bool, StoreError> {
        if status == OrderStatus::New {
            return Ok(false);
        }
        let query = UpdateOrderStatus { number, status };
        let applied = retry_transient(&self.retry, "UpdateOrderStatus", || {
            self.db.process(query.clone())
        })
        .await?;
        if !applied {
            // distinguish "terminal" from "missing"
            self.get_by_number(number).await?;
        }
        Ok(applied)
    }

    async fn get_by_number(&self, number: i64) -> Result<OrderRecord, StoreError> {
        let query = GetOrderByNumber { number };
        retry_transient(&self.retry, "GetOrderByNumber", || {
            self.db.process(query.clone())
        })
        .await?
        .ok_or(StoreError::OrderNotFound(number))
    }
}

#[async_trait]
impl BalanceStore for PgStore {
    async fn credit_once(
        &self,
        number: i64,
        amount: Decimal,
    ) -> Result<CreditOutcome, StoreError> {
        let query = CreditOrderOnce { number, amount };
        retry_transient(&self.retry, "CreditOrderOnce", || {
            self.db.process(query.clone())
        })
        .await
    }

    async fn balance(&self, user_id: i64) -> Result<Decimal, StoreError> {
        let query = GetUserBalance { user_id };
        Ok(retry_transient(&self.retry, "GetUserBalance", || self.db.process(query.clone())).await?)
    }

    async fn withdrawn(&self, user_id: i64) -> Result<Decimal, StoreError> {
        let query = GetUserWithdrawn { user_id };
        Ok(
            retry_transient(&self.retry, "GetUserWithdrawn", || {
                self.db.process(query.clone())
            })
            .await?,
        )
    }

    async fn withdrawals(&self, user_id: i64) -> Result<Vec<BalanceTransaction>, StoreError> {
        let query = GetUserWithdrawals { user_id };
        Ok(
            retry_transient(&self.retry, "GetUserWithdrawals", || {
                self.db.process(query.clone())
            })
            .await?,
        )
    }

    async fn record_withdrawal(
        &self,
        user_id: i64,
        order_number: i64,
        amount: Decimal,
    ) -> Result<BalanceTransaction, StoreError> {
        let query = RecordWithdrawal {
            user_id,
            order_number,
            amount,
        };
        retry_transient(&self.retry, "RecordWithdrawal", || {
            self.db.process(query.clone())
        })
        .await
    }
}
