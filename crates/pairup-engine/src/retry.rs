use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::store::StoreResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
        }
    }
}

/// Run `operation` until it succeeds, fails non-transiently, or attempts run out.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, operation_name: &str, mut operation: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Store operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    "Store operation failed ({}), retrying in {:?}",
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(err) => {
                if err.is_transient() {
                    error!(operation = operation_name, attempt, "Store operation failed, retries exhausted: {}", err);
                }
                return Err(err);
            }
        }
    }
}

/// Like [`with_backoff`], but a final failure is logged and swallowed.
/// Used for cleanup steps whose failure must not stop the caller.
pub async fn best_effort<T, F, Fut>(policy: &RetryPolicy, step: &str, operation: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    match with_backoff(policy, step, operation).await {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Non-critical step '{}' failed, continuing: {}", step, err);
            None
        }
    }
}
