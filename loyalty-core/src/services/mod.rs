//! Entry points used by the user-facing surface: uploading orders and
//! reading or spending the point balance.

pub mod balance;
pub mod order_intake;

pub use balance::{BalanceService, WithdrawError};
pub use order_intake::{IntakeError, OrderIntake};
