//! Classify HTTP status and fetch errors into retry policy error kinds.

use super::error::FetchError;
use super::policy::ErrorKind;

/// Classify a non-200 HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 => ErrorKind::Throttled,
        _ => ErrorKind::Other,
    }
}

/// Classify a fetch error into an ErrorKind.
pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::RateLimited => ErrorKind::Throttled,
        FetchError::Timeout(_) => ErrorKind::Timeout,
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::Parse(_) | FetchError::Transport(_) | FetchError::RetriesExhausted { .. } => {
            ErrorKind::Other
        }
    }
}
