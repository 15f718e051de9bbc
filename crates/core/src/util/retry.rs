//! Exponential backoff for flaky network calls.
//!
//! Each retry waits `initial_delay * multiplier^(attempt-1)`, capped at
//! `max_delay`, plus up to `jitter` of random spread.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to every wait.
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: Duration::from_millis(100),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// No retries: the first failure is returned as-is.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter.is_zero() {
            return base;
        }
        let spread = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(spread)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is exhausted. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retryable failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Timeouts, throttling and server-side failures are worth another try.
pub fn is_http_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn base_delay_doubles_until_capped() {
        let config = RetryConfig {
            max_attempts: 6,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(500),
            jitter: Duration::ZERO,
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let config = RetryConfig {
            jitter: Duration::from_millis(50),
            ..RetryConfig::new(3, Duration::from_millis(100))
        };
        for _ in 0..32 {
            let d = config.delay_for_attempt(1);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn http_statuses_classified() {
        assert!(is_http_retryable(408));
        assert!(is_http_retryable(429));
        assert!(is_http_retryable(503));
        assert!(!is_http_retryable(400));
        assert!(!is_http_retryable(404));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(
            &RetryConfig::new(3, Duration::from_millis(10)),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("busy")
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            &RetryConfig::new(5, Duration::from_millis(10)),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("bad request") }
            },
            |e| *e != "bad request",
        )
        .await;
        assert_eq!(result, Err("bad request"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn none_makes_a_single_attempt_even_when_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            &RetryConfig::none(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("busy") }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Err("busy"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
