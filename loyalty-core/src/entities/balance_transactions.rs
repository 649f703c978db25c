//! Append-only points ledger.
//!
//! Positive amounts are accrual credits, negative amounts are withdrawals.
//! Balances are always derived by summation.

use crate::entities::OrderStatus;
use crate::framework::DatabaseProcessor;
use crate::stores::StoreError;
use kanau::processor::Processor;
use loyalty_sdk::objects::WithdrawalItem;
use rust_decimal::Decimal;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BalanceTransaction {
    pub id: i64,
    pub user_id: i64,
    pub order_number: i64,
    pub amount: Decimal,
    pub processed_at: OffsetDateTime,
}

impl BalanceTransaction {
    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// User-facing view of a withdrawal, with a positive `sum`.
    pub fn to_withdrawal_item(&self) -> WithdrawalItem {
        WithdrawalItem {
            order: self.order_number.to_string(),
            sum: self.amount.abs(),
            processed_at: self.processed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The order is now `PROCESSED` and the user's balance includes its accrual.
    Credited { user_id: i64 },
    /// A previous delivery already credited this order. Nothing changed.
    AlreadyCredited,
}

#[derive(Debug, Clone)]
/// Mark an order processed and credit its accrual, at most once.
///
/// Runs in one transaction with the order row locked, so the status flip
/// and the ledger row are never observed separately. A zero accrual only
/// flips the status.
pub struct CreditOrderOnce {
    pub number: i64,
    pub amount: Decimal,
}

impl Processor<CreditOrderOnce> for DatabaseProcessor {
    type Output = CreditOutcome;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:CreditOrderOnce")]
    async fn process(&self, credit: CreditOrderOnce) -> Result<CreditOutcome, StoreError> {
        let CreditOrderOnce { number, amount } = credit;
        if amount < Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        let order: Option<(i64, OrderStatus)> =
            sqlx::query_as("SELECT user_id, status FROM orders WHERE number = $1 FOR UPDATE")
                .bind(number)
                .fetch_optional(&mut *tx)
                .await?;
        let (user_id, status) = order.ok_or(StoreError::OrderNotFound(number))?;

        let credited: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM balance_transactions WHERE order_number = $1 AND amount > 0)",
        )
        .bind(number)
        .fetch_one(&mut *tx)
        .await?;
        if credited || status == OrderStatus::Processed {
            return Ok(CreditOutcome::AlreadyCredited);
        }
        if status == OrderStatus::Invalid {
            return Err(StoreError::TerminalOrder { number, status });
        }

        sqlx::query("UPDATE orders SET status = 'PROCESSED', accrual = $2 WHERE number = $1")
            .bind(number)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        if amount > Decimal::ZERO {
            let inserted = sqlx::query(
                r#"
                INSERT INTO balance_transactions (user_id, order_number, amount)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(user_id)
            .bind(number)
            .bind(amount)
            .execute(&mut *tx)
            .await;
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Ok(CreditOutcome::AlreadyCredited),
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(CreditOutcome::Credited { user_id })
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[derive(Debug, Clone)]
pub struct GetUserBalance {
    pub user_id: i64,
}

impl Processor<GetUserBalance> for DatabaseProcessor {
    type Output = Decimal;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserBalance")]
    async fn process(&self, query: GetUserBalance) -> Result<Decimal, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM balance_transactions WHERE user_id = $1",
        )
        .bind(query.user_id)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Total ever withdrawn, as a positive amount.
pub struct GetUserWithdrawn {
    pub user_id: i64,
}

impl Processor<GetUserWithdrawn> for DatabaseProcessor {
    type Output = Decimal;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserWithdrawn")]
    async fn process(&self, query: GetUserWithdrawn) -> Result<Decimal, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(-SUM(amount), 0)
            FROM balance_transactions
            WHERE user_id = $1 AND amount < 0
            "#,
        )
        .bind(query.user_id)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Withdrawal rows of a user, oldest first.
pub struct GetUserWithdrawals {
    pub user_id: i64,
}

impl Processor<GetUserWithdrawals> for DatabaseProcessor {
    type Output = Vec<BalanceTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserWithdrawals")]
    async fn process(
        &self,
        query: GetUserWithdrawals,
    ) -> Result<Vec<BalanceTransaction>, sqlx::Error> {
        sqlx::query_as::<_, BalanceTransaction>(
            r#"
            SELECT id, user_id, order_number, amount, processed_at
            FROM balance_transactions
            WHERE user_id = $1 AND amount < 0
            ORDER BY processed_at ASC, id ASC
            "#,
        )
        .bind(query.user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Spend `amount` points of a user against `order_number`.
///
/// The balance is re-checked under a per-user advisory lock, so concurrent
/// withdrawals cannot overdraw the account.
pub struct RecordWithdrawal {
    pub user_id: i64,
    pub order_number: i64,
    pub amount: Decimal,
}

impl Processor<RecordWithdrawal> for DatabaseProcessor {
    type Output = BalanceTransaction;
    type Error = StoreError;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordWithdrawal")]
    async fn process(&self, withdrawal: RecordWithdrawal) -> Result<BalanceTransaction, StoreError> {
        let RecordWithdrawal {
            user_id,
            order_number,
            amount,
        } = withdrawal;
        if amount <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let available: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM balance_transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let row = sqlx::query_as::<_, BalanceTransaction>(
            r#"
            INSERT INTO balance_transactions (user_id, order_number, amount)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, order_number, amount, processed_at
            "#,
        )
        .bind(user_id)
        .bind(order_number)
        .bind(-amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }
}
