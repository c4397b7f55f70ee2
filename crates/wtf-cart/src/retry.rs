//! Single bounded retry for transient cart failures.
//!
//! A failed call is retried at most once, after a fixed delay. Idempotent
//! operations (fetch, quantity change, clear, update) retry on network
//! errors, timeouts, and 5xx responses. Adds and line removals are not
//! idempotent: a request that reached the server may have created or
//! shifted a line, so they retry only when the connection was never
//! established.

use std::future::Future;
use std::time::Duration;

use crate::error::{CartError, ErrorKind};

/// Upper bound on retries regardless of configuration.
const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure; clamped to 1.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            delay,
        }
    }
}

/// Returns `true` if `err` is worth one more attempt.
///
/// Invalid-variant, not-found, 4xx, validation, and decode errors are
/// never retried; resubmitting returns the same answer.
fn is_retriable(err: &CartError, idempotent: bool) -> bool {
    match err {
        CartError::Network { source, .. } => idempotent || source.is_connect(),
        CartError::Timeout { .. } => idempotent,
        _ => idempotent && err.kind() == ErrorKind::Server,
    }
}

/// Runs `operation`, retrying once per `policy` on transient errors.
pub(crate) async fn retry_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    idempotent: bool,
    mut operation: F,
) -> Result<T, CartError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CartError>>,
{
    let max_retries = policy.max_retries.min(MAX_RETRIES);
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= max_retries || !is_retriable(&err, idempotent) {
            return Err(err);
        }

        attempt += 1;
        let delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(
            attempt,
            delay_ms,
            operation = ?err.operation(),
            error = %err,
            "transient cart error, retrying"
        );
        tokio::time::sleep(policy.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(1, Duration::ZERO)
    }

    async fn connect_error() -> reqwest::Error {
        reqwest::Client::new()
            .get("http://127.0.0.1:1/cart.js")
            .send()
            .await
            .unwrap_err()
    }

    async fn count_calls<F>(policy: RetryPolicy, idempotent: bool, make_err: F) -> (u32, bool)
    where
        F: Fn() -> CartError,
    {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(policy, idempotent, || {
            let c = Arc::clone(&c);
            let err = make_err();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), CartError>(err)
            }
        })
        .await;
        (calls.load(Ordering::SeqCst), result.is_err())
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_policy(fast(), true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, CartError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_error_retried_once_for_idempotent_ops() {
        let (calls, failed) = count_calls(fast(), true, || CartError::Fetch { status: 503 }).await;
        assert_eq!(calls, 2);
        assert!(failed);
    }

    #[tokio::test]
    async fn server_error_not_retried_for_add() {
        let (calls, _) = count_calls(fast(), false, || CartError::Add {
            status: 500,
            description: String::new(),
        })
        .await;
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn invalid_variant_never_retried() {
        let (calls, _) = count_calls(fast(), true, || CartError::InvalidVariant {
            description: "sold out".to_owned(),
        })
        .await;
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn timeout_retried_only_when_idempotent() {
        let timeout = || CartError::Timeout {
            operation: Operation::Fetch,
            after_secs: 12,
        };
        assert_eq!(count_calls(fast(), true, timeout).await.0, 2);
        assert_eq!(count_calls(fast(), false, timeout).await.0, 1);
    }

    #[tokio::test]
    async fn policy_none_disables_retry() {
        let (calls, _) =
            count_calls(RetryPolicy::none(), true, || CartError::Fetch { status: 502 }).await;
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn max_retries_is_clamped_to_one() {
        let policy = RetryPolicy {
            max_retries: 5,
            delay: Duration::ZERO,
        };
        let (calls, _) = count_calls(policy, true, || CartError::Fetch { status: 500 }).await;
        assert_eq!(calls, 2);
        assert_eq!(RetryPolicy::new(9, Duration::ZERO).max_retries, 1);
    }

    #[tokio::test]
    async fn connect_error_retried_even_for_add() {
        let source = connect_error().await;
        assert!(source.is_connect());
        let err = CartError::Network {
            operation: Operation::Add,
            source,
        };
        assert!(is_retriable(&err, false));
    }
}
