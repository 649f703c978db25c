//! Fixed-schedule retry for transient storage failures.
//!
//! The schedule is a `backon` backoff yielding its delays in order, so a
//! retrying call is an ordinary future: dropping it (for instance when a
//! worker races it against shutdown) also cancels any pending delay.

use backon::{BackoffBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Errors that may succeed if the same operation is simply repeated.
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for sqlx::Error {
    /// Connectivity problems only: IO, TLS, pool acquisition timeouts and
    /// SQLSTATE class `08` (connection exception).
    fn is_transient(&self) -> bool {
        match self {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(e) => e.code().is_some_and(|code| code.starts_with("08")),
            _ => false,
        }
    }
}

/// Delays to wait before each retry. The operation is attempted at most
/// `delays.len() + 1` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// Fail on the first error.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_secs(&[1, 2, 5])
    }
}

impl BackoffBuilder for RetrySchedule {
    type Backoff = std::vec::IntoIter<Duration>;

    fn build(self) -> Self::Backoff {
        self.delays.into_iter()
    }
}

/// Run `op`, repeating it on transient errors according to `schedule`.
///
/// Non-transient errors are returned immediately. When the schedule is
/// exhausted the last error is logged and returned.
pub async fn retry_transient<T, E, F, Fut>(
    schedule: &RetrySchedule,
    operation: &str,
    op: F,
) -> Result<T, E>
where
    E: TransientError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let result = op
        .retry(schedule.clone())
        .when(|e: &E| e.is_transient())
        .notify(|e: &E, delay: Duration| {
            warn!(operation, ?delay, error = %e, "Transient storage error, retrying");
        })
        .await;

    if let Err(e) = &result
        && e.is_transient()
    {
        error!(operation, error = %e, "Retries exhausted");
    }
    result
}
