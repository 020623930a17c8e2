use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AssistantError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after the first failure; doubles on every further failure.
    pub initial_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, with `attempt` counted from 1.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

/// Runs `op` until it succeeds, returns a non-retryable error, or
/// `max_attempts` is used up. Each attempt is bounded by `attempt_timeout`.
/// `op` receives the 1-based attempt number.
pub async fn retry_with_timeout<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, AssistantError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AssistantError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let wait = policy.backoff_after(attempt);
                warn!("Attempt {}/{} failed: {}. Retrying in {:?}", attempt, max_attempts, e, wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("Attempt {}/{} failed: {}. Giving up", attempt, max_attempts, e);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = policy();
        assert_eq!(p.backoff_after(1), Duration::from_millis(100));
        assert_eq!(p.backoff_after(2), Duration::from_millis(200));
        assert_eq!(p.backoff_after(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_timeout(&policy(), |_| {
            calls += 1;
            async {
                Err(AssistantError::Status {
                    status: 500,
                    body: "boom".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AssistantError::Status { status: 500, .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_a_later_attempt() {
        let start = tokio::time::Instant::now();
        let result = retry_with_timeout(&policy(), |attempt| async move {
            if attempt < 3 {
                Err(AssistantError::EmptyResponse)
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        // 100ms after the first failure, 200ms after the second
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(300) && waited < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn each_attempt_is_bounded_by_the_timeout() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_timeout(&policy(), |_| {
            calls += 1;
            std::future::pending()
        })
        .await;

        assert!(matches!(result, Err(AssistantError::Timeout(_))));
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_timeout(&policy(), |_| {
            calls += 1;
            async {
                Err(AssistantError::Status {
                    status: 401,
                    body: "bad key".into(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
