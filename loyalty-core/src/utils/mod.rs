pub mod luhn;
pub mod retry;
pub mod shutdown;
