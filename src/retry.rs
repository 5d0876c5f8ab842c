//! Drives one logical operation across attempts.
//!
//! Each attempt runs under the policy's `try_timeout`. Transient failures
//! are retried after the delay computed by [`RetryPolicy`]; everything else
//! ends the run with that error. Waiting uses `tokio::time::sleep`, never a
//! blocking sleep.

use std::future::Future;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::{HubError, Result, RetryPolicy};

/// Runs `operation` until it succeeds or the policy stops retrying.
///
/// `operation` receives the 1-based attempt number. Only the final outcome
/// is returned; intermediate failures are discarded.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run_with_retry_cancellable(policy, &CancellationToken::new(), operation).await
}

/// Like [`run_with_retry`], but stops with [`HubError::Cancelled`] as soon as
/// `cancel` fires, whether an attempt is in flight or a delay is pending.
pub async fn run_with_retry_cancellable<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let try_timeout = policy.options().try_timeout;
    let mut attempt = 1u32;

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(attempt));
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(attempt)),
            outcome = timeout(try_timeout, operation(attempt)) => outcome,
        };

        let err = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(HubError::Cancelled)) => return Err(cancelled(attempt)),
            Ok(Err(err)) => err,
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, ?try_timeout, "attempt timed out");
                HubError::Timeout(try_timeout)
            }
        };

        if !err.is_transient() {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt, error = %err, "non-transient error, giving up");
            return Err(err);
        }

        let Some(delay) = policy.calculate_retry_delay(&err, attempt) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(attempt, error = %err, "retry budget exhausted");
            return Err(err);
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(attempt, ?delay, error = %err, "retrying after delay");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(attempt)),
            _ = sleep(delay) => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

fn cancelled(_attempt: u32) -> HubError {
    #[cfg(feature = "tracing")]
    tracing::debug!(attempt = _attempt, "operation cancelled");
    HubError::Cancelled
}
