//! Bounded fixed-delay retry around every external gateway call.
//!
//! Only `Transient` failures are retried; permission problems and order
//! rejections surface immediately. A call that exhausts its attempts
//! returns the last error so the caller can skip the current tick's
//! action, never the whole process.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::EngineResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_secs(config.retry_delay_secs),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Run `call` under the policy, logging each failed attempt with the
/// operation name and attempt count.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    operation, attempt, policy.max_attempts, e, policy.delay
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        "{} failed (attempt {}/{}): {}, giving up",
                        operation, attempt, policy.max_attempts, e
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_retried_up_to_bound() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<()> = with_retry(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Transient("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(EngineError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_mid_sequence() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(EngineError::Transient("down".into()))
                } else {
                    Ok("up")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permission_not_retried() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<()> = with_retry(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Permission("denied".into())) }
        })
        .await;
        assert!(matches!(result, Err(EngineError::Permission(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_not_retried() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<()> = with_retry(&fast_policy(), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Rejected("bad size".into())) }
        })
        .await;
        assert!(matches!(result, Err(EngineError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
