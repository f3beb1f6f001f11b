//! Bounded retry with exponential backoff for idempotent store calls.

use std::future::Future;

use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::types::config::RetryPolicy;

/// Run `op` until it succeeds, fails permanently, or the policy's attempt
/// budget is spent.
///
/// Only [`StoreError::is_transient`] errors are retried. Never use this for
/// non-idempotent calls such as a history append.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A transient error used by callers that only need the retry classification.
pub(crate) fn unavailable(message: impl Into<String>) -> StoreError {
    let message: String = message.into();
    StoreError::Unavailable(message.into())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_delays(Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), "fetch", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable("connection reset"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_retry(&fast_policy(3), "upsert", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable("timeout"))
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_retry(&fast_policy(5), "delete", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Corrupt("bad row".into()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Corrupt(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
