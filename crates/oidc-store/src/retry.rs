//! Retry with exponential backoff for transient store failures.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreResult;

/// Retry settings for store calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the second attempt. Doubles on each retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, operation: &str, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempts = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempts += 1;
                if !e.is_retryable() || attempts >= policy.max_attempts {
                    return Err(e);
                }

                tracing::warn!(
                    operation,
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "Store operation failed, retrying"
                );

                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}
