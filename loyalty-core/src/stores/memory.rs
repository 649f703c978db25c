use crate::entities::OrderStatus;
use crate::entities::balance_transactions::{BalanceTransaction, CreditOutcome};
use crate::entities::order_records::{CreateOutcome, OrderRecord};
use crate::stores::{BalanceStore, OrderStore, StoreError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    orders: BTreeMap<i64, OrderRecord>,
    ledger: Vec<BalanceTransaction>,
    next_id: i64,
}

impl MemoryState {
    fn append(&mut self, user_id: i64, order_number: i64, amount: Decimal) -> BalanceTransaction {
        self.next_id += 1;
        let row = BalanceTransaction {
            id: self.next_id,
            user_id,
            order_number,
            amount,
            processed_at: OffsetDateTime::now_utc(),
        };
        self.ledger.push(row.clone());
        row
    }

    fn balance(&self, user_id: i64) -> Decimal {
        self.ledger
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.amount)
            .sum()
    }
}

/// Orders and ledger kept in process behind a single lock.
///
/// Cloning shares the same state. Every operation holds the lock for its
/// whole duration, which gives the same atomicity as the database
/// transactions of [`PgStore`](crate::stores::PgStore).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every ledger row, in insertion order.
    pub async fn ledger(&self) -> Vec<BalanceTransaction> {
        self.state.read().await.ledger.clone()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create(&self, user_id: i64, number: i64) -> Result<CreateOutcome, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.orders.get(&number) {
            return Ok(if existing.user_id == user_id {
                CreateOutcome::AlreadyUploaded
            } else {
                CreateOutcome::UploadedByAnotherUser
            });
        }
        state.orders.insert(
            number,
            OrderRecord {
                number,
                user_id,
                status: OrderStatus::New,
                accrual: Decimal::ZERO,
                uploaded_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(CreateOutcome::Accepted)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<OrderRecord>, StoreError> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then(b.number.cmp(&a.number))
        });
        Ok(orders)
    }

    async fn get_pending(&self) -> Result<Vec<OrderRecord>, StoreError> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.uploaded_at);
        Ok(orders)
    }

    async fn update_status(&self, number: i64, status: OrderStatus) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&number)
            .ok_or(StoreError::OrderNotFound(number))?;
        if !order.status.can_transition_to(status) {
            return Ok(false);
        }
        order.status = status;
        Ok(true)
    }

    async fn get_by_number(&self, number: i64) -> Result<OrderRecord, StoreError> {
        self.state
            .read()
            .await
            .orders
            .get(&number)
            .cloned()
            .ok_or(StoreError::OrderNotFound(number))
    }
}

#[async_trait]
impl BalanceStore for InMemoryStore {
    async fn credit_once(
        &self,
        number: i64,
        amount: Decimal,
    ) -> Result<CreditOutcome, StoreError> {
        if amount < Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }
        let mut state = self.state.write().await;
        let (user_id, status) = state
            .orders
            .get(&number)
            .map(|o| (o.user_id, o.status))
            .ok_or(StoreError::OrderNotFound(number))?;

        let credited = state
            .ledger
            .iter()
            .any(|t| t.order_number == number && t.is_credit());
        if credited || status == OrderStatus::Processed {
            return Ok(CreditOutcome::AlreadyCredited);
        }
        if status == OrderStatus::Invalid {
            return Err(StoreError::TerminalOrder { number, status });
        }

        if let Some(order) = state.orders.get_mut(&number) {
            order.status = OrderStatus::Processed;
            order.accrual = amount;
        }
        if amount > Decimal::ZERO {
            state.append(user_id, number, amount);
        }
        Ok(CreditOutcome::Credited { user_id })
    }

    async fn balance(&self, user_id: i64) -> Result<Decimal, StoreError> {
        Ok(self.state.read().await.balance(user_id))
    }

    async fn withdrawn(&self, user_id: i64) -> Result<Decimal, StoreError> {
        let state = self.state.read().await;
        let total: Decimal = state
            .ledger
            .iter()
            .filter(|t| t.user_id == user_id && t.amount < Decimal::ZERO)
            .map(|t| t.amount)
            .sum();
        Ok(-total)
    }

    async fn withdrawals(&self, user_id: i64) -> Result<Vec<BalanceTransaction>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|t| t.user_id == user_id && t.amount < Decimal::ZERO)
            .cloned()
            .collect())
    }

    async fn record_withdrawal(
        &self,
        user_id: i64,
        order_number: i64,
        amount: Decimal,
    ) -> Result<BalanceTransaction, StoreError> {
        if amount <= Decimal::ZERO {
            return Err(StoreError::InvalidAmount(amount));
        }
        let mut state = self.state.write().await;
        let available = state.balance(user_id);
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        Ok(state.append(user_id, order_number, -amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ORDER: i64 = 79927398713;

    #[tokio::test]
    async fn test_create_reports_owner() {
        let store = InMemoryStore::new();
        assert_eq!(store.create(1, ORDER).await.unwrap(), CreateOutcome::Accepted);
        assert_eq!(
            store.create(1, ORDER).await.unwrap(),
            CreateOutcome::AlreadyUploaded
        );
        assert_eq!(
            store.create(2, ORDER).await.unwrap(),
            CreateOutcome::UploadedByAnotherUser
        );
        assert_eq!(
            store.get_by_number(ORDER).await.unwrap().status,
            OrderStatus::New
        );
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = InMemoryStore::new();
        store.create(1, ORDER).await.unwrap();
        assert!(store.update_status(ORDER, OrderStatus::Processing).await.unwrap());
        assert!(store.update_status(ORDER, OrderStatus::Invalid).await.unwrap());
        assert!(!store.update_status(ORDER, OrderStatus::Processing).await.unwrap());
        assert!(!store.update_status(ORDER, OrderStatus::Processed).await.unwrap());
        assert_eq!(
            store.get_by_number(ORDER).await.unwrap().status,
            OrderStatus::Invalid
        );
        assert!(store.get_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_order() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.update_status(ORDER, OrderStatus::Processing).await,
            Err(StoreError::OrderNotFound(ORDER))
        ));
    }

    #[tokio::test]
    async fn test_credit_is_idempotent() {
        let store = InMemoryStore::new();
        store.create(1, ORDER).await.unwrap();

        assert_eq!(
            store.credit_once(ORDER, dec!(500.50)).await.unwrap(),
            CreditOutcome::Credited { user_id: 1 }
        );
        assert_eq!(
            store.credit_once(ORDER, dec!(500.50)).await.unwrap(),
            CreditOutcome::AlreadyCredited
        );

        let order = store.get_by_number(ORDER).await.unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, dec!(500.50));
        assert_eq!(store.balance(1).await.unwrap(), dec!(500.50));
        assert_eq!(store.ledger().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_order_is_not_credited() {
        let store = InMemoryStore::new();
        store.create(1, ORDER).await.unwrap();
        store.update_status(ORDER, OrderStatus::Invalid).await.unwrap();
        assert!(matches!(
            store.credit_once(ORDER, dec!(10)).await,
            Err(StoreError::TerminalOrder { .. })
        ));
        assert!(store.ledger().await.is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_needs_funds() {
        let store = InMemoryStore::new();
        store.create(1, ORDER).await.unwrap();
        store.credit_once(ORDER, dec!(100)).await.unwrap();

        assert!(matches!(
            store.record_withdrawal(1, 2377225624, dec!(150)).await,
            Err(StoreError::InsufficientFunds { .. })
        ));
        let row = store.record_withdrawal(1, 2377225624, dec!(40)).await.unwrap();
        assert_eq!(row.amount, dec!(-40));

        assert_eq!(store.balance(1).await.unwrap(), dec!(60));
        assert_eq!(store.withdrawn(1).await.unwrap(), dec!(40));
        assert_eq!(store.withdrawals(1).await.unwrap(), vec![row]);
    }
}
