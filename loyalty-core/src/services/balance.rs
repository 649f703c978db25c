use crate::stores::{BalanceStore, StoreError};
use crate::utils::luhn;
use loyalty_sdk::objects::{BalanceSummary, WithdrawalItem};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WithdrawError {
    #[error("withdrawal sum must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("invalid order number: {0:?}")]
    InvalidOrderNumber(String),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WithdrawError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InsufficientFunds {
                requested,
                available,
            } => WithdrawError::InsufficientFunds {
                requested,
                available,
            },
            StoreError::InvalidAmount(amount) => WithdrawError::NonPositiveAmount(amount),
            other => WithdrawError::Store(other),
        }
    }
}

/// Read and spend a user's points.
#[derive(Clone)]
pub struct BalanceService {
    balances: Arc<dyn BalanceStore>,
}

impl BalanceService {
    pub fn new(balances: Arc<dyn BalanceStore>) -> Self {
        Self { balances }
    }

    pub async fn summary(&self, user_id: i64) -> Result<BalanceSummary, StoreError> {
        Ok(BalanceSummary {
            current: self.balances.balance(user_id).await?,
            withdrawn: self.balances.withdrawn(user_id).await?,
        })
    }

    /// Past withdrawals, oldest first.
    pub async fn withdrawals(&self, user_id: i64) -> Result<Vec<WithdrawalItem>, StoreError> {
        let rows = self.balances.withdrawals(user_id).await?;
        Ok(rows.iter().map(|t| t.to_withdrawal_item()).collect())
    }

    /// Spend `sum` points against the order `order`.
    ///
    /// Checks run in order: positive sum, Luhn-valid order number, then the
    /// balance. Nothing is written when any of them fails.
    pub async fn withdraw(
        &self,
        user_id: i64,
        order: &str,
        sum: Decimal,
    ) -> Result<WithdrawalItem, WithdrawError> {
        if sum <= Decimal::ZERO {
            return Err(WithdrawError::NonPositiveAmount(sum));
        }
        let order_number = order
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|n| luhn::is_valid_order_number(*n))
            .ok_or_else(|| WithdrawError::InvalidOrderNumber(order.to_owned()))?;

        match self
            .balances
            .record_withdrawal(user_id, order_number, sum)
            .await
        {
            Ok(row) => {
                info!(user = user_id, order = order_number, %sum, "Points withdrawn");
                Ok(row.to_withdrawal_item())
            }
            Err(e) => {
                let e = WithdrawError::from(e);
                if let WithdrawError::InsufficientFunds { available, .. } = &e {
                    warn!(user = user_id, order = order_number, %sum, %available, "Withdrawal rejected");
                }
                Err(e)
            }
        }
    }
}
