//! Exponential backoff retry for the HTTP clients.
//!
//! Both managed services throttle scripted access; the clients classify
//! their own errors through [`Retryable`] and the policy decides whether
//! and how long to wait.

use std::time::Duration;
use tracing::{debug, warn};

/// Error classification hook for [`RetryPolicy`].
pub trait Retryable {
    /// Whether a retry could plausibly succeed (network failures,
    /// throttling, 5xx responses).
    fn is_retryable(&self) -> bool;

    /// Server-suggested wait, e.g. from a `Retry-After` header.
    fn retry_after_secs(&self) -> Option<u64> {
        None
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: u64,
    /// Maximum delay cap in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay_secs: 1,
            max_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given max retries and base delay; the
    /// delay cap defaults to 60 seconds.
    #[must_use]
    pub fn new(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
            max_delay_secs: 60,
        }
    }

    /// Whether the error should be retried at the given attempt number.
    pub fn should_retry<E: Retryable>(&self, attempt: u32, error: &E) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Delay before the next attempt: the server's `Retry-After` when
    /// present, otherwise `min(base * 2^attempt, max)`.
    pub fn delay_for<E: Retryable>(&self, attempt: u32, error: &E) -> Duration {
        let secs = match error.retry_after_secs() {
            Some(retry_after) => retry_after.min(self.max_delay_secs),
            None => self
                .base_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt))
                .min(self.max_delay_secs),
        };
        Duration::from_secs(secs)
    }

    /// Run an async operation with retry.
    ///
    /// `f` is called until it succeeds, returns a non-retryable error, or
    /// the retry budget is spent; the final error is returned unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt = attempt + 1, "succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if attempt > 0 {
                            warn!(
                                operation,
                                attempts = attempt + 1,
                                error = %error,
                                "giving up after retries"
                            );
                        }
                        return Err(error);
                    }
                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
