//! Deadline-bounded retry for blob store calls
//!
//! Each call at the storage boundary yields an [`Outcome`]: success, a
//! failure the caller may retry, or a fatal failure. [`with_backoff`] keeps
//! retrying the retryable ones with exponential backoff plus jitter until
//! the next sleep would cross the policy deadline, measured from the first
//! attempt. The number of attempts is not capped.

use crate::config::RetryConfig;
use crate::log_retry_attempt;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Classified result of one attempt
#[derive(Debug)]
pub enum Outcome<T, E> {
    Success(T),
    Retryable(E),
    Fatal(E),
}

impl<T, E> Outcome<T, E> {
    /// Classifies a result with a predicate over the error
    pub fn classify(result: Result<T, E>, is_retryable: impl Fn(&E) -> bool) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) if is_retryable(&err) => Outcome::Retryable(err),
            Err(err) => Outcome::Fatal(err),
        }
    }
}

/// Exponential backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Total budget from the first attempt
    pub deadline: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
            deadline: Duration::from_secs(config.deadline_seconds),
        }
    }

    /// Un-jittered delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Picks a delay uniformly in `[delay / 2, delay]`
    pub fn jittered(&self, delay: Duration) -> Duration {
        let full = delay.as_millis() as u64;
        let half = full / 2;
        Duration::from_millis(rand::thread_rng().gen_range(half..=full))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Runs `op` until it succeeds, fails fatally, or the deadline runs out
///
/// When the deadline is exhausted the error of the last attempt is returned
/// unchanged.
pub async fn with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match Outcome::classify(op().await, &is_retryable) {
            Outcome::Success(value) => return Ok(value),
            Outcome::Fatal(err) => return Err(err),
            Outcome::Retryable(err) => {
                let delay = policy.jittered(policy.delay_for(attempt));
                if started.elapsed() + delay > policy.deadline {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "Retry deadline exhausted"
                    );
                    return Err(err);
                }
                log_retry_attempt!(operation, attempt, delay, err);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(deadline_ms: u64) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(8),
            multiplier: 2.0,
            deadline: Duration::from_millis(deadline_ms),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let d = policy.jittered(Duration::from_millis(1000));
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_outcome_classify() {
        let ok: Result<u8, &str> = Ok(1);
        assert!(matches!(Outcome::classify(ok, |_| true), Outcome::Success(1)));

        let transient: Result<u8, &str> = Err("503");
        assert!(matches!(
            Outcome::classify(transient, |e| *e == "503"),
            Outcome::Retryable(_)
        ));

        let fatal: Result<u8, &str> = Err("403");
        assert!(matches!(
            Outcome::classify(fatal, |e| *e == "503"),
            Outcome::Fatal(_)
        ));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<&str, String> =
            with_backoff(&fast_policy(5_000), "test", |_| true, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> =
            with_backoff(&fast_policy(5_000), "test", |_| false, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("permission denied".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "permission denied");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_surfaces_original_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = Instant::now();
        let result: Result<(), String> =
            with_backoff(&fast_policy(40), "test", |_| true, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("503 attempt {n}"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.starts_with("503 attempt"));
        assert!(counter.load(Ordering::SeqCst) > 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_deadline_means_single_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> =
            with_backoff(&fast_policy(0), "test", |_| true, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("503".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
