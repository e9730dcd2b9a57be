//! Retry with exponential backoff for transient booking-service failures.
//!
//! Only idempotent calls (reads, login) are worth retrying; a booking or a
//! cancellation that timed out may already have been applied remotely.
//!
//! # Example
//!
//! ```rust
//! use roombook_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_retries(2)
//!     .initial_delay(Duration::from_millis(50))
//!     .build();
//!
//! let rooms = retry_with_predicate(
//!     &policy,
//!     || async { Ok::<_, String>(vec!["Atlas"]) },
//!     |err: &String| err.contains("timeout"),
//! )
//! .await?;
//! # let _ = rooms;
//! # Ok(())
//! # }
//! ```

use crate::metrics::RetryMetrics;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Start building a policy from the defaults
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// A policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `attempt` (0-based), capped and jittered.
    ///
    /// The jitter factor lies in `[0.5, 1.0]`, so the result never exceeds
    /// `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());
        if capped <= 0.0 {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(capped * jitter)
    }
}

/// Builder for [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set the number of retries
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Set the first delay
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set the delay cap
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set the growth factor
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Run `operation`, retrying failures for which `is_retryable` holds.
///
/// Non-retryable errors are returned immediately; retryable ones are retried
/// until `policy.max_retries` is exhausted, after which the last error is
/// returned.
///
/// # Errors
///
/// Returns the operation's error when it is not retryable or retries run out.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            },
            Err(err) if !is_retryable(&err) => {
                tracing::debug!(error = %err, "Operation failed with non-retryable error");
                return Err(err);
            },
            Err(err) => {
                if attempt >= policy.max_retries {
                    RetryMetrics::record_exhausted();
                    tracing::error!(attempt, error = %err, "Operation failed after max retries");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                RetryMetrics::record_attempt();
                tracing::warn!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(retries)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(2))
            .build()
    }

    #[test]
    fn delays_grow_and_stay_capped() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(300))
            .multiplier(2.0)
            .build();

        let first = policy.delay_for_attempt(0);
        assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(100));

        for attempt in 0..10 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(300));
        }
    }

    #[test]
    fn none_policy_has_no_delay() {
        assert_eq!(RetryPolicy::none().delay_for_attempt(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_with_predicate(
            &fast_policy(3),
            || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("timeout".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), String> = retry_with_predicate(
            &fast_policy(5),
            || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("invalid credentials".to_string())
                }
            },
            |err| err.contains("timeout"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), String> = retry_with_predicate(
            &fast_policy(2),
            || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("timeout".to_string())
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "timeout");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
