pub mod accrual;
pub mod user;

pub use accrual::{
    AccrualReply, AccrualResponse, AccrualStatus, RateLimitDirective, RateLimitParseError,
};
pub use user::{BalanceSummary, OrderItem, OrderStatus, WithdrawRequest, WithdrawalItem};
