//! Retry configuration and delay calculation.
//!
//! Provides [`RetryConfig`] for controlling retries of primary-provider calls
//! and the shared `with_retry()` helper the dispatcher wraps each primary
//! call in.
//!
//! Only transient errors are retried (see [`WaypostError::is_transient`]).
//! 403/429 are never retried: they go to the failure cache and the fallback
//! provider instead.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{Result, WaypostError};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff. The default is no retry: one attempt, then the
/// fallback provider answers.
///
/// ```rust
/// # use waypost::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(2)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.max_attempts(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt. 0 = no retry. Default: 0.
    pub max_retries: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 10s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config that never retries.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Total attempts including the initial request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Execute an async operation with retry logic.
///
/// Transient errors are retried up to `config.max_retries` times with
/// exponential backoff. Anything else is returned immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &'static str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts();
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "provider" => provider_name.to_owned(),
                    "operation" => operation,
                )
                .increment(1);
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    provider = provider_name,
                    operation,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or(WaypostError::NoProvider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(retries: u32) -> RetryConfig {
        RetryConfig::new()
            .max_retries(retries)
            .initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn transient_error_retried_until_exhausted() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(2), "test", "geocode", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WaypostError::Api {
                status: 503,
                message: "down".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(5), "test", "geocode", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(WaypostError::RateLimited { retry_after: None })
        })
        .await;
        assert!(matches!(result, Err(WaypostError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failure() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&fast(1), "test", "route", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(WaypostError::Timeout)
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
