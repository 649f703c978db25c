//! AccrualChecker processor.
//!
//! The AccrualChecker is responsible for:
//! - Popping order numbers from the Unchecked Queue
//! - Looking each one up in the accrual service
//! - Pushing the mapped [`AccrualOutcome`] onto the Checked Queue
//! - Keeping its request rate within the limit the service dictates
//!
//! The limiter state is owned by the checker alone. A window timer resets
//! the request counter; while the counter is exhausted the checker only
//! waits for that timer. A `429` replaces the limit and the window length
//! and closes the current window. A lookup in flight is abandoned on shutdown.

use crate::config::AccrualCheckerConfig;
use crate::entities::OrderStatus;
use crate::queues::{AccrualOutcome, CheckedSender, UncheckedReceiver};
use crate::utils::shutdown::cancelled;
use async_trait::async_trait;
use loyalty_sdk::client::{AccrualClient, ClientError};
use loyalty_sdk::objects::{AccrualReply, AccrualResponse, RateLimitDirective};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The external service computing accruals.
#[async_trait]
pub trait AccrualSource: Send + Sync {
    async fn lookup(&self, number: i64) -> Result<AccrualReply, ClientError>;
}

#[async_trait]
impl AccrualSource for AccrualClient {
    async fn lookup(&self, number: i64) -> Result<AccrualReply, ClientError> {
        self.get_order(number).await
    }
}

const MIN_WINDOW: Duration = Duration::from_secs(1);

/// Request budget of the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiter {
    request_limit: u32,
    counter: u32,
    check_interval: Duration,
}

impl RateLimiter {
    pub fn new(request_limit: u32, check_interval: Duration) -> Self {
        Self {
            request_limit: request_limit.max(1),
            counter: 0,
            check_interval: check_interval.max(MIN_WINDOW),
        }
    }

    pub fn request_limit(&self) -> u32 {
        self.request_limit
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn is_exhausted(&self) -> bool {
        self.counter >= self.request_limit
    }

    pub fn record_attempt(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Adopt a directive from the service and mark the current window as used up.
    ///
    /// A zero limit is raised to one. A zero retry-after keeps the current
    /// window length, which is the configured `check_interval` until some
    /// directive carried a usable value.
    pub fn apply(&mut self, directive: RateLimitDirective) {
        self.request_limit = directive.request_limit.max(1);
        if !directive.retry_after.is_zero() {
            self.check_interval = directive.retry_after.max(MIN_WINDOW);
        }
        self.counter = self.request_limit;
    }
}

/// What happened to a single lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// A result worth persisting.
    Outcome(AccrualOutcome),
    /// Nothing to persist now; the order stays pending in storage.
    Skipped,
    /// The service asked to slow down.
    RateLimited(RateLimitDirective),
}

/// Map a service response onto the local state machine.
///
/// `REGISTERED` and `PROCESSING` become `PROCESSING` with no accrual.
/// Unknown statuses and negative amounts yield `None`.
pub fn outcome_from_response(number: i64, response: &AccrualResponse) -> Option<AccrualOutcome> {
    let status = OrderStatus::from_accrual(&response.status)?;
    let accrual = match status {
        OrderStatus::Processed | OrderStatus::Invalid => response.accrual.unwrap_or(Decimal::ZERO),
        OrderStatus::New | OrderStatus::Processing => Decimal::ZERO,
    };
    if accrual < Decimal::ZERO {
        return None;
    }
    Some(AccrualOutcome {
        number,
        status,
        accrual,
    })
}

pub struct AccrualChecker {
    source: Arc<dyn AccrualSource>,
    unchecked_rx: UncheckedReceiver,
    checked_tx: CheckedSender,
    shutdown_rx: watch::Receiver<bool>,
    limiter: RateLimiter,
    reset_period: Duration,
    request_timeout: Duration,
}

impl AccrualChecker {
    pub fn new(
        config: AccrualCheckerConfig,
        source: Arc<dyn AccrualSource>,
        unchecked_rx: UncheckedReceiver,
        checked_tx: CheckedSender,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            unchecked_rx,
            checked_tx,
            shutdown_rx,
            limiter: RateLimiter::new(config.request_limit, config.check_interval),
            reset_period: config.reset_period.max(MIN_WINDOW),
            request_timeout: config.request_timeout,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn run(mut self) {
        info!(
            limit = self.limiter.request_limit(),
            reset_period = ?self.reset_period,
            "AccrualChecker started"
        );

        let mut window = new_window(self.reset_period);
        let mut cancel_rx = self.shutdown_rx.clone();

        loop {
            if self.limiter.is_exhausted() {
                tokio::select! {
                    biased;

                    _ = cancelled(&mut self.shutdown_rx) => {
                        info!("AccrualChecker received shutdown signal");
                        break;
                    }

                    _ = window.tick() => {
                        self.limiter.reset();
                        continue;
                    }
                }
            }

            let number = tokio::select! {
                biased;

                _ = window.tick() => {
                    self.limiter.reset();
                    continue;
                }

                popped = self.unchecked_rx.pop(&mut self.shutdown_rx) => match popped {
                    Some(number) => number,
                    None => {
                        info!("AccrualChecker received shutdown signal");
                        break;
                    }
                },
            };

            let result = tokio::select! {
                biased;

                _ = cancelled(&mut cancel_rx) => {
                    info!(order = number, "AccrualChecker received shutdown signal");
                    break;
                }

                result = self.check_order(number) => result,
            };

            match result {
                LookupResult::Outcome(outcome) => {
                    if let Err(e) = self.checked_tx.push(outcome, &mut self.shutdown_rx).await {
                        info!(reason = %e, "AccrualChecker stopping");
                        break;
                    }
                }
                LookupResult::Skipped => {}
                LookupResult::RateLimited(_) => {
                    window = new_window(self.limiter.check_interval());
                }
            }
        }

        info!("AccrualChecker shutdown complete");
    }

    /// Look up one order and update the limiter.
    ///
    /// Every attempt counts against the budget except a rate-limited one,
    /// which saturates it instead.
    pub async fn check_order(&mut self, number: i64) -> LookupResult {
        let reply = tokio::time::timeout(self.request_timeout, self.source.lookup(number)).await;

        let reply = match reply {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.limiter.record_attempt();
                warn!(order = number, error = %e, "Accrual lookup failed");
                return LookupResult::Skipped;
            }
            Err(_) => {
                self.limiter.record_attempt();
                warn!(
                    order = number,
                    timeout = ?self.request_timeout,
                    "Accrual lookup timed out"
                );
                return LookupResult::Skipped;
            }
        };

        match reply {
            AccrualReply::RateLimited(directive) => {
                self.limiter.apply(directive);
                warn!(
                    order = number,
                    limit = directive.request_limit,
                    retry_after = ?directive.retry_after,
                    "Accrual service rate limit hit"
                );
                LookupResult::RateLimited(directive)
            }
            AccrualReply::NotRegistered => {
                self.limiter.record_attempt();
                info!(order = number, "Order not registered in accrual service");
                LookupResult::Skipped
            }
            AccrualReply::Found(response) => {
                self.limiter.record_attempt();
                match outcome_from_response(number, &response) {
                    Some(outcome) => {
                        debug!(order = number, status = %outcome.status, accrual = %outcome.accrual, "Accrual checked");
                        LookupResult::Outcome(outcome)
                    }
                    None => {
                        warn!(
                            order = number,
                            status = %response.status,
                            accrual = ?response.accrual,
                            "Unusable accrual response"
                        );
                        LookupResult::Skipped
                    }
                }
            }
        }
    }
}

/// Window timer whose first tick fires one full `period` from now.
fn new_window(period: Duration) -> Interval {
    let mut window = tokio::time::interval_at(Instant::now() + period, period);
    window.set_missed_tick_behavior(MissedTickBehavior::Delay);
    window
}
