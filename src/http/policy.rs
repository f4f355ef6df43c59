//! Bounded exponential backoff around a single network operation.

use anyhow::Result;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::retry::is_retryable_error;

/// Default number of attempts, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Decides whether a failed attempt may be repeated.
pub type RetryPredicate = fn(&anyhow::Error) -> bool;

/// How an operation is retried: attempt count, backoff schedule, total time budget
/// and the predicate selecting retryable errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first one
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each retry
    pub multiplier: f64,
    /// Retrying stops once the next sleep would cross this budget
    pub max_elapsed: Option<Duration>,
    /// Defaults to [`is_retryable_error`]
    pub retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            max_elapsed: Some(Duration::from_secs(30)),
            retryable: is_retryable_error,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_elapsed(mut self, budget: Option<Duration>) -> Self {
        self.max_elapsed = budget;
        self
    }

    pub fn with_retryable(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    /// Delay to wait after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Runs `operation` until it succeeds or retrying is pointless.
    /// The error of the last attempt is returned unchanged.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            let e = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("{}: succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(e) => e,
            };

            if !(self.retryable)(&e) {
                debug!("{}: non-retryable error: {}", operation_name, e);
                return Err(e);
            }

            if attempt >= self.max_attempts {
                warn!(
                    "{}: giving up after {} attempt(s): {}",
                    operation_name, attempt, e
                );
                return Err(e);
            }

            let delay = self.delay_for(attempt);
            if let Some(budget) = self.max_elapsed {
                if started.elapsed() + delay > budget {
                    warn!(
                        "{}: retry budget of {}ms exhausted after {} attempt(s): {}",
                        operation_name,
                        budget.as_millis(),
                        attempt,
                        e
                    );
                    return Err(e);
                }
            }

            warn!(
                "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                operation_name,
                attempt,
                self.max_attempts,
                e,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
