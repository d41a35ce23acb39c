//! Retry Policy - bounded attempts with exponential backoff
//!
//! Wraps a single fallible async operation. The backoff schedule is a pure
//! function of the retry index so timing is testable without real waits;
//! the suspension between attempts is a tokio timer, never a thread block.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first call
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for every subsequent retry
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(2000),
        }
    }
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Attempt budget; always at least one.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Backoff delay before retry number `retry` (zero-based).
    ///
    /// Doubles per retry: base, base*2, base*4, ... Saturates instead of
    /// overflowing for absurd retry counts.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.config.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// Surfaces the last error once no attempts remain. Between attempts the
    /// task suspends for the backoff delay, yielding to other scheduled work.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> std::result::Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, error = %e, "Retry budget exhausted");
                        return Err(e);
                    }

                    let delay = self.backoff_delay(attempt - 1);
                    debug!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_per_retry() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_delay(0), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_uses_configured_base() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
        });

        assert_eq!(policy.backoff_delay(0), Duration::from_millis(50));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_saturates_on_large_retry_index() {
        let policy = RetryPolicy::default();
        // Must not overflow, only saturate
        assert!(policy.backoff_delay(200) > Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 0,
            base_delay: Duration::from_millis(1),
        });
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_without_retry() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
        });
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> = policy
            .run(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_surfaces_last_error() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
        });
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .run(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {}", call)) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_timing() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let result: Result<(), String> = policy.run(|| async { Err("down".to_string()) }).await;
        assert!(result.is_err());

        // Four attempts with sleeps of 2s, 4s, 8s between them
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(14));
        assert!(elapsed < Duration::from_secs(15));
    }
}
