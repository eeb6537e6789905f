//! Retry loop: run an async operation until success or the policy says stop.

use std::future::Future;

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Terminal result of a retried operation that never succeeded.
#[derive(Debug)]
pub enum RetryError<E> {
    /// A non-retryable error ended the loop.
    Terminal { attempts: u32, error: E },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
}

/// Runs `op` until it succeeds or the policy says to stop. `classify` maps each
/// error to a kind; on a retryable kind the loop sleeps for the backoff, if any,
/// then tries again. `op` receives the 1-based attempt number.
pub async fn run_with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    classify: C,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorKind,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        let err = match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        match policy.decide(attempt, classify(&err)) {
            RetryDecision::NoRetry => {
                return Err(RetryError::Terminal {
                    attempts: attempt,
                    error: err,
                })
            }
            RetryDecision::Exhausted => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                })
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
