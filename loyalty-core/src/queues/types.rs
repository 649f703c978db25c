use crate::entities::OrderStatus;
use rust_decimal::Decimal;

/// Verified accrual result waiting to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualOutcome {
    pub number: i64,
    /// Already mapped to the local state machine. Never `NEW`.
    pub status: OrderStatus,
    /// Zero unless the order is `PROCESSED` or `INVALID` with a reported amount.
    pub accrual: Decimal,
}
