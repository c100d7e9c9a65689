use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Full-Jitter Exponential Backoff
// ============================================================================
//
// Retry strategy for transient failures. The unjittered ceiling grows
// exponentially with the attempt number and is capped; the actual sleep is
// drawn uniformly from [0, ceiling) so that concurrently failing workers do
// not retry in lockstep.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Ceiling for the delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on the delay ceiling.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Budget for persisting a single stream message.
    pub fn ingest() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Unjittered delay ceiling after the k-th failed attempt:
/// `min(base * 2^(k-1), cap)`.
pub fn exponential_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// Actual sleep: uniform in `[0, exponential_delay)`.
pub fn full_jitter_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let ceiling = exponential_delay(attempt, base, cap);
    if ceiling.is_zero() {
        return Duration::ZERO;
    }
    let nanos = ceiling.as_nanos().min(u128::from(u64::MAX)) as u64;
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}

/// Distinguishes faults worth retrying from outcomes that retrying cannot
/// change.
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Transient failures exhausted the attempt budget.
    Failed(E),
    /// Non-retryable outcome; surfaced after the first attempt.
    PermanentFailure(E),
    /// Cancellation was observed while backing off.
    Cancelled(E),
}

/// Run `operation` until it succeeds, returns a non-transient error, or the
/// attempt budget runs out. The backoff sleep races the cancellation token so
/// shutdown is not delayed by a long delay.
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "operation succeeded after retry");
                }
                return RetryResult::Success(value);
            }
            Err(error) if !error.is_transient() => {
                return RetryResult::PermanentFailure(error);
            }
            Err(error) => {
                if attempt >= config.max_attempts {
                    tracing::error!(
                        attempt,
                        error = %error,
                        "operation failed after all attempts"
                    );
                    return RetryResult::Failed(error);
                }

                let delay = full_jitter_delay(attempt, config.base_delay, config.max_delay);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, backing off"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return RetryResult::Cancelled(error),
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Permanent => write!(f, "permanent"),
            }
        }
    }

    impl IsTransient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    #[test]
    fn test_exponential_delay_doubles_then_caps() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);

        assert_eq!(exponential_delay(1, base, cap), Duration::from_secs(1));
        assert_eq!(exponential_delay(2, base, cap), Duration::from_secs(2));
        assert_eq!(exponential_delay(3, base, cap), Duration::from_secs(4));
        assert_eq!(exponential_delay(4, base, cap), Duration::from_secs(8));
        assert_eq!(exponential_delay(5, base, cap), Duration::from_secs(16));
        // min(1 * 2^5, 30) = 30
        assert_eq!(exponential_delay(6, base, cap), Duration::from_secs(30));
        assert_eq!(exponential_delay(60, base, cap), cap);
    }

    #[test]
    fn test_full_jitter_stays_below_ceiling() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);

        for attempt in 1..=8 {
            let ceiling = exponential_delay(attempt, base, cap);
            for _ in 0..50 {
                assert!(full_jitter_delay(attempt, base, cap) < ceiling);
            }
        }
    }

    #[test]
    fn test_zero_base_yields_zero_delay() {
        assert_eq!(
            full_jitter_delay(3, Duration::ZERO, Duration::ZERO),
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_on_transient(&fast_config(3), &cancel, |_attempt| {
            let counter = counter_clone.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success("success")));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_the_attempt_budget() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_on_transient(&fast_config(4), &cancel, |_attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Transient)
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Failed(TestError::Transient)));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_failure_short_circuits() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let cancel = CancellationToken::new();

        let result = retry_on_transient(&fast_config(5), &cancel, |_attempt| {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TestError::Permanent)
            }
        })
        .await;

        assert!(matches!(
            result,
            RetryResult::PermanentFailure(TestError::Permanent)
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_the_backoff_sleep() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };

        let started = std::time::Instant::now();
        let result = retry_on_transient(&config, &cancel, |_attempt| async {
            Err::<(), _>(TestError::Transient)
        })
        .await;

        assert!(matches!(result, RetryResult::Cancelled(_)));
        // the long backoff sleep must not have run to completion
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
