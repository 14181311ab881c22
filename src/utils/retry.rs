//! Retry utilities: backoff builders and retryable error classification.
//!
//! The lifecycle engine never retries on its own. Callers that want to retry
//! transient store failures wrap the call in [`with_retry`], which only
//! retries errors classified as retryable.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::error::LifecycleError;

/// Standard backoff for store writes and reads.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: 5
/// - Jitter enabled
pub fn store_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(5)
        .with_jitter()
}

/// Determines if a lifecycle error is worth retrying.
///
/// Retryable: store failures (`Creation`, `Update`, `Lookup`).
///
/// Non-retryable: validation, duplicate identifiers, unknown packages and
/// missing sign-in. These fail identically on every attempt.
pub fn is_retryable(err: &LifecycleError) -> bool {
    err.is_retryable()
}

/// Run `operation`, retrying retryable failures with `backoff`.
pub async fn with_retry<T, F, Fut>(
    operation: F,
    backoff: ExponentialBuilder,
) -> Result<T, LifecycleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LifecycleError>>,
{
    operation
        .retry(backoff)
        .when(is_retryable)
        .notify(|err: &LifecycleError, delay: Duration| {
            warn!(error = %err, ?delay, "Retrying after store failure");
        })
        .await
}
