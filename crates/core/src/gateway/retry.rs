//! Bounded, cancellable retries around a single backend call.

use crate::config::RetryPolicy;
use crate::errors::{BackendError, CallError, Service};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `op` until it succeeds, fails permanently, or exhausts `policy`.
///
/// Each attempt is bounded by `attempt_timeout`; an elapsed timeout counts as
/// a transient [`BackendError::Timeout`]. Cancellation aborts the in-flight
/// attempt and any pending backoff.
pub async fn call_with_retry<T, F, Fut>(
    service: Service,
    policy: &RetryPolicy,
    attempt_timeout: Duration,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
            result = tokio::time::timeout(attempt_timeout, op()) => match result {
                Ok(inner) => inner,
                Err(_) => Err(BackendError::Timeout),
            },
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_transient() || attempt > policy.max_retries {
            tracing::warn!(%service, attempt, %error, "giving up on backend call");
            return Err(CallError::Unavailable {
                service,
                attempts: attempt,
                reason: error.to_string(),
            });
        }

        let delay = policy.backoff_for(attempt);
        tracing::warn!(%service, attempt, ?delay, %error, "transient backend error, retrying");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
