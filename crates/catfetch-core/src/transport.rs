//! HTTP transport boundary.
//!
//! `Transport` is the seam between the fetcher and the network. The production
//! implementation uses the curl crate (libcurl) with one blocking GET per call;
//! the fetcher runs it on the blocking pool. Tests substitute scripted transports.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// Status and body of one completed HTTP exchange (any status code).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    TimedOut(String),
    #[error("{0}")]
    Failed(String),
}

/// Performs one GET for one identifier. Blocking; called from `spawn_blocking`.
pub trait Transport: Send + Sync + 'static {
    fn get(&self, id: &str) -> Result<HttpResponse, TransportError>;
}

/// libcurl-backed transport: GET `{base}{id}` with fixed headers and timeouts.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    base: url::Url,
    headers: Vec<String>,
    timeout: Duration,
    connect_timeout: Duration,
}

impl CurlTransport {
    pub fn new(
        base_url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut base = url::Url::parse(base_url).context("invalid api_base_url")?;
        // Joining "123" onto ".../products" would replace the last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let headers = headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k.trim(), v.trim()))
            .collect();
        Ok(Self {
            base,
            headers,
            timeout,
            connect_timeout,
        })
    }

    /// Request URL for one identifier; the id is percent-encoded as a single path segment.
    pub fn url_for(&self, id: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id);
        }
        url.to_string()
    }

    fn perform(&self, id: &str) -> Result<HttpResponse, curl::Error> {
        let mut body = Vec::new();
        let mut easy = curl::easy::Easy::new();
        easy.url(&self.url_for(id))?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(5)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        // libcurl may otherwise raise SIGALRM-based timeouts across threads.
        easy.signal(false)?;

        if !self.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for h in &self.headers {
                list.append(h)?;
            }
            easy.http_headers(list)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        Ok(HttpResponse { status, body })
    }
}

impl Transport for CurlTransport {
    fn get(&self, id: &str) -> Result<HttpResponse, TransportError> {
        self.perform(id).map_err(|e| {
            if e.is_operation_timedout() {
                TransportError::TimedOut(e.to_string())
            } else {
                TransportError::Failed(e.to_string())
            }
        })
    }
}
