//! Fetch one identifier: request, classify, retry under policy, record the outcome.

use std::sync::Arc;

use crate::progress_log::ProgressSink;
use crate::record::Record;
use crate::retry::{self, FetchError, RetryError, RetryPolicy};
use crate::transport::Transport;

/// Terminal outcome for one identifier in one run.
#[derive(Debug)]
pub enum FetchResult {
    Success(Record),
    Failure(FetchError),
    /// Never attempted (the run was cancelled first). Not logged; retried next run.
    Skipped,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }
}

/// Shared by every fetch task of a run.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    sink: Arc<dyn ProgressSink>,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            transport,
            policy,
            sink,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `id` until success, a terminal error, or retry exhaustion, and appends
    /// the identifier to the processed or failed log accordingly.
    pub async fn fetch(&self, id: &str) -> FetchResult {
        let outcome =
            retry::run_with_retry(&self.policy, retry::classify, |attempt| self.attempt(id, attempt))
                .await;
        match outcome {
            Ok(record) => {
                self.sink.processed(id);
                FetchResult::Success(record)
            }
            Err(RetryError::Terminal { attempts, error }) => {
                tracing::warn!(id, attempts, error = %error, "fetch failed");
                self.sink.failed(id);
                FetchResult::Failure(error)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(id, attempts, last = %last, "max retries reached");
                self.sink.failed(id);
                FetchResult::Failure(FetchError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                })
            }
        }
    }

    async fn attempt(&self, id: &str, attempt: u32) -> Result<Record, FetchError> {
        let transport = Arc::clone(&self.transport);
        let owned = id.to_string();
        let response = tokio::task::spawn_blocking(move || transport.get(&owned))
            .await
            .map_err(|e| FetchError::Transport(format!("transport task: {}", e)))??;
        tracing::trace!(id, attempt, status = response.status, "response");
        match response.status {
            200 => Record::from_json_body(id, &response.body).map_err(FetchError::Parse),
            429 => Err(FetchError::RateLimited),
            code => Err(FetchError::Http(code)),
        }
    }
}
