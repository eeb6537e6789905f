//! Retry and backoff policy.
//!
//! Classification (throttled, timed out, other) and backoff decisions live here so
//! the fetcher does not hand-code its retry loop. The policy is plain data built
//! from `RetryConfig`; `run_with_retry` drives any async operation under it.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryError};
