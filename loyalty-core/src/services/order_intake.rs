use crate::entities::order_records::CreateOutcome;
use crate::stores::{OrderStore, StoreError};
use crate::utils::luhn;
use loyalty_sdk::objects::OrderItem;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Longest order number that always fits the storage integer.
const MAX_DIGITS: usize = 18;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid order number: {0:?}")]
    InvalidNumber(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accepts uploaded order numbers into the order store, where the Fetcher
/// picks them up.
#[derive(Clone)]
pub struct OrderIntake {
    orders: Arc<dyn OrderStore>,
}

impl OrderIntake {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Parse a user-supplied order number.
    ///
    /// Surrounding whitespace is ignored. The rest must be 1 to 18 ASCII
    /// digits forming a positive, Luhn-valid number.
    pub fn parse_number(text: &str) -> Result<i64, IntakeError> {
        let invalid = || IntakeError::InvalidNumber(text.to_owned());
        let digits = text.trim();
        if digits.is_empty()
            || digits.len() > MAX_DIGITS
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let number: i64 = digits.parse().map_err(|_| invalid())?;
        if !luhn::is_valid_order_number(number) {
            return Err(invalid());
        }
        Ok(number)
    }

    pub async fn add_order(&self, user_id: i64, text: &str) -> Result<CreateOutcome, IntakeError> {
        let number = Self::parse_number(text)?;
        let outcome = self.orders.create(user_id, number).await?;
        info!(user = user_id, order = number, ?outcome, "Order uploaded");
        Ok(outcome)
    }

    /// Orders of a user, newest first.
    pub async fn list_orders(&self, user_id: i64) -> Result<Vec<OrderItem>, IntakeError> {
        let orders = self.orders.list_by_user(user_id).await?;
        Ok(orders.iter().map(|o| o.to_item()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryStore;
    use loyalty_sdk::objects::OrderStatus;

    #[test]
    fn test_parse_number() {
        assert_eq!(OrderIntake::parse_number("79927398713").unwrap(), 79927398713);
        assert_eq!(OrderIntake::parse_number(" 79927398713\n").unwrap(), 79927398713);

        for text in [
            "",
            "   ",
            "79927398710",
            "0",
            "-79927398713",
            "+79927398713",
            "7992 7398713",
            "abc",
            "1234567890123456789",
        ] {
            assert!(
                matches!(
                    OrderIntake::parse_number(text),
                    Err(IntakeError::InvalidNumber(_))
                ),
                "{text:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_add_and_list_orders() {
        let intake = OrderIntake::new(Arc::new(InMemoryStore::new()));

        assert_eq!(
            intake.add_order(1, "79927398713").await.unwrap(),
            CreateOutcome::Accepted
        );
        assert_eq!(
            intake.add_order(1, "79927398713").await.unwrap(),
            CreateOutcome::AlreadyUploaded
        );
        assert_eq!(
            intake.add_order(2, "79927398713").await.unwrap(),
            CreateOutcome::UploadedByAnotherUser
        );
        assert!(matches!(
            intake.add_order(1, "79927398710").await,
            Err(IntakeError::InvalidNumber(_))
        ));

        let orders = intake.list_orders(1).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].number, "79927398713");
        assert_eq!(orders[0].status, OrderStatus::New);
        assert_eq!(orders[0].accrual, None);
        assert!(intake.list_orders(2).await.unwrap().is_empty());
    }
}
