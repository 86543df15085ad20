//! forge::retry
//!
//! Exponential backoff for idempotent host calls.
//!
//! Transient failures (network errors, rate limits, 5xx) are retried up to
//! `max_attempts` total attempts. Waits double from `initial_backoff` and are
//! capped at `max_backoff`. A rate limit that asks us to wait longer than
//! `max_backoff` is surfaced instead of slept on.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::traits::ForgeError;

/// Retry policy for idempotent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single wait.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// How long to wait after failed attempt number `attempt` (1-based).
    ///
    /// Returns `None` when the host's requested wait exceeds `max_backoff`.
    pub fn backoff(&self, attempt: u32, err: &ForgeError) -> Option<Duration> {
        if let ForgeError::RateLimited {
            retry_after: Some(hint),
        } = err
        {
            return (*hint <= self.max_backoff).then_some(*hint);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(
            self.initial_backoff
                .saturating_mul(factor)
                .min(self.max_backoff),
        )
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ForgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ForgeError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let Some(wait) = self.backoff(attempt, &err) else {
                        return Err(err);
                    };
                    warn!(
                        request = what,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        let err = ForgeError::NetworkError("reset".into());
        assert_eq!(policy.backoff(1, &err), Some(Duration::from_millis(100)));
        assert_eq!(policy.backoff(2, &err), Some(Duration::from_millis(200)));
        assert_eq!(policy.backoff(3, &err), Some(Duration::from_millis(350)));
        assert_eq!(policy.backoff(40, &err), Some(Duration::from_millis(350)));
    }

    #[test]
    fn backoff_honors_rate_limit_hint() {
        let policy = RetryPolicy::default();
        let short = ForgeError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        let long = ForgeError::RateLimited {
            retry_after: Some(Duration::from_secs(3600)),
        };
        assert_eq!(policy.backoff(1, &short), Some(Duration::from_secs(2)));
        assert_eq!(policy.backoff(1, &long), None);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast()
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ForgeError::NetworkError("reset".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ForgeError::ApiError {
                    status: 503,
                    message: "unavailable".into(),
                })
            })
            .await;
        assert!(matches!(result, Err(ForgeError::ApiError { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ForgeError::AuthFailed("Bad credentials".into()))
            })
            .await;
        assert!(matches!(result, Err(ForgeError::AuthFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_policy_runs_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<(), _> = RetryPolicy::none()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ForgeError::NetworkError("reset".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
