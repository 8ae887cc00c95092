//! Retry utility for handling transient errors in async operations
//!
//! Provides a fixed-delay retry policy with an optional predicate that stops
//! retrying on errors which will never succeed (for example a closed handle).

use std::time::Duration;
use tokio::time::sleep;

/// Configurable retry policy for async operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Execute an async operation, retrying only errors accepted by `should_retry`
///
/// An error rejected by the predicate is returned at once without waiting.
///
/// # Examples
/// ```rust
/// use brokerlink::core::retry::{retry_async_when, RetryPolicy};
///
/// # async fn example() -> Result<String, String> {
/// let result = retry_async_when(
///     "broker_connect",
///     RetryPolicy::default(),
///     || async { Ok::<String, String>("connected".to_string()) },
///     |e: &String| !e.contains("closed"),
/// )
/// .await?;
/// # Ok(result)
/// # }
/// ```
pub async fn retry_async_when<F, T, E, Fut, P>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= max_attempts || !should_retry(&error) {
                    return Err(error);
                }
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    policy.delay,
                    error
                );
                sleep(policy.delay).await;
            }
        }
    }
}
