pub mod balance_transactions;
pub mod order_records;

use loyalty_sdk::objects::{AccrualStatus, OrderStatus as SdkOrderStatus};

/// Order status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `loyalty_sdk::objects::OrderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE", type_name = "order_status")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    /// `INVALID` and `PROCESSED` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }

    /// Status only moves forward: `NEW -> PROCESSING -> {INVALID, PROCESSED}`.
    /// Re-applying the current non-terminal status is allowed.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::New => next != OrderStatus::New,
            OrderStatus::Processing => next != OrderStatus::New,
            OrderStatus::Invalid | OrderStatus::Processed => false,
        }
    }

    /// Local status for a status reported by the accrual service.
    ///
    /// `REGISTERED` has not started yet and is tracked as `PROCESSING`.
    /// Unknown statuses have no local counterpart.
    pub fn from_accrual(status: &AccrualStatus) -> Option<OrderStatus> {
        match status {
            AccrualStatus::Registered | AccrualStatus::Processing => Some(OrderStatus::Processing),
            AccrualStatus::Invalid => Some(OrderStatus::Invalid),
            AccrualStatus::Processed => Some(OrderStatus::Processed),
            AccrualStatus::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        })
    }
}

impl From<OrderStatus> for SdkOrderStatus {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::New => SdkOrderStatus::New,
            OrderStatus::Processing => SdkOrderStatus::Processing,
            OrderStatus::Invalid => SdkOrderStatus::Invalid,
            OrderStatus::Processed => SdkOrderStatus::Processed,
        }
    }
}

impl From<SdkOrderStatus> for OrderStatus {
    fn from(value: SdkOrderStatus) -> Self {
        match value {
            SdkOrderStatus::New => OrderStatus::New,
            SdkOrderStatus::Processing => OrderStatus::Processing,
            SdkOrderStatus::Invalid => OrderStatus::Invalid,
            SdkOrderStatus::Processed => OrderStatus::Processed,
        }
    }
}
