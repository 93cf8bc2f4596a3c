//! Retry policies and the helper that applies them
//!
//! Every remote interaction (feed download, page scrape, Telegram delivery,
//! SQLite access) runs through [`with_retry`] with a [`RetryPolicy`] value
//! describing how many attempts it gets, how long to back off between them
//! and which errors are worth another attempt.

use std::future::Future;
use std::time::Duration;

use crate::Error;

/// Exponential backoff schedule plus a retryable-error predicate
#[derive(Debug)]
pub struct RetryPolicy<E = Error> {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor applied per failed attempt
    pub multiplier: u32,
    /// Errors for which this returns false propagate immediately
    pub retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> RetryPolicy<E> {
    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// base * multiplier^(attempt - 1), capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl RetryPolicy<Error> {
    /// Source fetches: 3 attempts, 2s doubling up to 10s
    pub fn fetch() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            multiplier: 2,
            retryable: Error::is_transient,
        }
    }

    /// Telegram delivery: 4 attempts, 2s doubling up to 30s
    pub fn publish() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            retryable: Error::is_transient,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error,
/// or exhausts `policy.max_attempts`. The last error is returned as-is.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    operation_name: &str,
    mut operation: F,
) -> std::result::Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && (policy.retryable)(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    error = %e,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Giving up after {} attempts",
                        attempt
                    );
                }
                return Err(e);
            }
        }
    }
}
