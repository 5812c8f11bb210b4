use std::{fmt, future::Future, time::Duration};

use tokio::time::sleep;

use crate::{NetworkMonitor, OnlineRetryError, RetryOptions};

/// Runs `operation` until it succeeds, fails with an error the options'
/// predicate rejects, or runs out of attempts.
///
/// Attempts are numbered from 1 and run strictly one after another. After a
/// retryable failure on attempt `n` (with attempts left), `on_retry(n, &err)`
/// is called and then the executor sleeps for
/// [`RetryPolicy::delay_for(n)`](crate::RetryPolicy::delay_for).
///
/// The error handed back is always the one produced by the last attempt,
/// unmodified.
///
/// # Example
///
/// ```no_run
/// use netretry::{with_retry, PlatformError, RetryOptions};
///
/// # async fn run() -> Result<(), PlatformError> {
/// let options = RetryOptions::<PlatformError>::default().max_retries(5);
/// let session = with_retry(
///     || async { Err::<String, _>(PlatformError::new("network unreachable")) },
///     &options,
/// )
/// .await?;
/// # let _ = session;
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(mut operation: F, options: &RetryOptions<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug,
{
    let max_attempts = options.policy.attempts();
    let mut attempt = 1u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !options.should_retry(&err) {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, error = ?err, "operation failed with non-retryable error");
            return Err(err);
        }

        if attempt >= max_attempts {
            #[cfg(feature = "tracing")]
            tracing::error!(attempts = max_attempts, error = ?err, "all retry attempts failed");
            return Err(err);
        }

        let delay = options.policy.delay_for(attempt);
        options.notify_retry(attempt, &err);

        #[cfg(feature = "tracing")]
        tracing::warn!(
            attempt,
            max_attempts,
            delay_ms = delay_millis(delay),
            error = ?err,
            "retrying operation"
        );

        sleep(delay).await;
        attempt += 1;
    }
}

/// Waits for connectivity when the monitor reports offline, then runs
/// [`with_retry`].
///
/// Fails with [`OnlineRetryError::Connectivity`] if the network does not
/// return within `wait_timeout`; the operation is not attempted in that case.
pub async fn with_retry_when_online<T, E, F, Fut>(
    monitor: &NetworkMonitor,
    wait_timeout: Duration,
    operation: F,
    options: &RetryOptions<E>,
) -> Result<T, OnlineRetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Debug,
{
    if !monitor.is_online() {
        #[cfg(feature = "tracing")]
        tracing::warn!("network offline, waiting before running operation");
        monitor.wait_for_online(wait_timeout).await?;
    }

    with_retry(operation, options)
        .await
        .map_err(OnlineRetryError::Operation)
}

#[cfg(feature = "tracing")]
fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
