//! Per-identifier fetch error type for retry classification.

use crate::transport::TransportError;

/// Why a single identifier could not be fetched. None of these abort a chunk or a run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Server answered 429; retryable.
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    /// Request did not complete within the timeout; retryable.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Any other non-200 status. Not retried.
    #[error("HTTP {0}")]
    Http(u32),
    /// 200 with a body that is not a usable JSON object. Not retried.
    #[error("malformed response body: {0}")]
    Parse(#[source] serde_json::Error),
    /// Connection, DNS, TLS and similar failures. Not retried.
    #[error("transport error: {0}")]
    Transport(String),
    /// Retryable failures used up the attempt budget.
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::TimedOut(msg) => FetchError::Timeout(msg),
            TransportError::Failed(msg) => FetchError::Transport(msg),
        }
    }
}
