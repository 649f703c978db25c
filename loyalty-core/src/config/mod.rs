//! Pipeline tuning.
//!
//! Every knob is passed to the workers at construction; nothing is read
//! from process-wide state.

use crate::queues::DEFAULT_QUEUE_CAPACITY;
use crate::utils::retry::RetrySchedule;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Capacity of both the Unchecked and the Checked Queue.
    pub queue_capacity: usize,
    pub fetcher: FetcherConfig,
    pub accrual: AccrualCheckerConfig,
    /// Retry schedule for transient storage failures.
    pub retry: RetrySchedule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            fetcher: FetcherConfig::default(),
            accrual: AccrualCheckerConfig::default(),
            retry: RetrySchedule::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Minimum delay between two scans of the order store.
    pub scan_interval: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualCheckerConfig {
    /// Requests allowed per window until the service says otherwise.
    pub request_limit: u32,
    /// Window length used after a 429 whose `Retry-After` is zero. A 429
    /// with a positive `Retry-After` replaces it for the rest of the run.
    pub check_interval: Duration,
    /// Length of the first window, before any directive was received.
    pub reset_period: Duration,
    /// Deadline of a single lookup.
    pub request_timeout: Duration,
}

impl Default for AccrualCheckerConfig {
    fn default() -> Self {
        Self {
            request_limit: 100,
            check_interval: Duration::from_secs(5),
            reset_period: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}
