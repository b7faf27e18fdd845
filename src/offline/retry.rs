//! # Retry with Exponential Backoff
//!
//! A pure control-flow combinator: run an operation up to a bounded number
//! of attempts, sleeping an exponentially growing, capped delay before each
//! retry, and stop early when the caller's predicate says the failure will
//! not succeed on repetition.
//!
//! ## Features
//!
//! - **Exponential Backoff**: `min(base_delay * 2^n, max_delay)` between attempts
//! - **Bounded Attempts**: Never more than `max_retries` calls
//! - **Retry Predicate**: Classify failures as retryable or terminal
//!
//! Delays are deterministic; no jitter is applied, so the schedule is
//! exactly testable.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use patrolsync::config::RetrySettings;
//! use patrolsync::offline::retry::retry;
//!
//! # async fn example(settings: RetrySettings) -> Result<(), String> {
//! let result = retry(settings, || async { fetch().await }, |e: &String| {
//!     !e.contains("rejected")
//! })
//! .await;
//! # result
//! # }
//! # async fn fetch() -> Result<(), String> { Ok(()) }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetrySettings;

/// Delay before the retry following `retry_count` failed attempts:
/// `min(base_delay * 2^retry_count, max_delay)`.
pub fn backoff_delay(settings: &RetrySettings, retry_count: u32) -> Duration {
    let exp = retry_count.min(31);
    let base_ms = settings.base_delay.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(1u64 << exp);
    let max_ms = settings.max_delay.as_millis() as u64;
    Duration::from_millis(delay_ms.min(max_ms))
}

/// Run `operation` with up to `settings.max_retries` attempts.
///
/// Sleeps the backoff delay before each retry, never before the first
/// attempt. After a failure, `should_retry` decides whether another attempt
/// is worth making; a false verdict fails immediately with that error. The
/// last error is returned once attempts are exhausted.
pub async fn retry<T, E, F, Fut, P>(
    settings: RetrySettings,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(&settings, attempt - 1)).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                if attempt >= settings.max_retries.max(1) || !should_retry(&error) {
                    return Err(error);
                }
                tracing::debug!(attempt, error = %error, "retrying after failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn settings(max_retries: u32) -> RetrySettings {
        RetrySettings {
            max_retries,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let s = settings(5);
        assert_eq!(backoff_delay(&s, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&s, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&s, 2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&s, 3), Duration::from_millis(5000));
        assert_eq!(backoff_delay(&s, 20), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_huge_count_does_not_overflow() {
        let s = settings(5);
        assert_eq!(backoff_delay(&s, u32::MAX), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32, String> = retry(
            settings(3),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32, String> = retry(
            settings(3),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("server exploded".to_string())
                }
            },
            |_| true,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32, String> = retry(
            settings(5),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("rejected".to_string())
                }
            },
            |e: &String| !e.contains("rejected"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32, String> = retry(
            settings(3),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("timeout".to_string())
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
