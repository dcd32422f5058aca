//! Retry loop: run an async attempt until success, exhaustion, or cancellation.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::policy::{RetryDecision, RetryPolicy};
use crate::error::FetchError;

/// How a retry sequence ended.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed; carries the last error.
    Exhausted { error: FetchError, attempts: u32 },
    /// Cancellation was observed; no further attempts were made.
    Aborted { attempts: u32 },
}

/// Runs `attempt_fn(attempt)` for attempt = 0..=max_retries.
///
/// Cancellation is checked before each attempt, raced against each attempt
/// and against the retry delay.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt_fn: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Aborted { attempts: attempt };
        }
        let result = tokio::select! {
            r = attempt_fn(attempt) => r,
            _ = cancel.cancelled() => Err(FetchError::Aborted),
        };
        let made = attempt + 1;
        let error = match result {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: made,
                }
            }
            Err(e) => e,
        };
        if error.is_aborted() || cancel.is_cancelled() {
            return RetryOutcome::Aborted { attempts: made };
        }
        match policy.decide(attempt) {
            RetryDecision::NoRetry => {
                return RetryOutcome::Exhausted {
                    error,
                    attempts: made,
                }
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(attempt = made, error = %error, ?delay, "attempt failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return RetryOutcome::Aborted { attempts: made },
                }
                attempt += 1;
            }
        }
    }
}
