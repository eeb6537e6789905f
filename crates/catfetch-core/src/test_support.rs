//! Scripted transports shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::transport::{HttpResponse, Transport, TransportError};

pub(crate) type Reply = Result<HttpResponse, TransportError>;

pub(crate) fn ok_json(body: &str) -> Reply {
    Ok(HttpResponse {
        status: 200,
        body: body.as_bytes().to_vec(),
    })
}

pub(crate) fn status(code: u32) -> Reply {
    Ok(HttpResponse {
        status: code,
        body: Vec::new(),
    })
}

pub(crate) fn timed_out() -> Reply {
    Err(TransportError::TimedOut("operation timed out".to_string()))
}

pub(crate) fn product(id: &str) -> Reply {
    ok_json(&format!(
        r#"{{"id": "{id}", "name": "Product {id}", "url_key": "p-{id}", "price": 1000}}"#
    ))
}

/// Per-identifier reply scripts. The last reply of a script repeats forever;
/// unknown identifiers get a 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, u32>>,
    total_calls: AtomicU32,
    delay: Duration,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Each call blocks for `delay`, to make overlapping calls observable.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn script(self, id: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), replies.into_iter().collect());
        self
    }

    pub(crate) fn calls_for(&self, id: &str) -> u32 {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, id: &str) -> Result<HttpResponse, TransportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(id.to_string()).or_insert(0) += 1;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(id) {
                Some(q) if q.len() > 1 => q.pop_front().unwrap_or_else(|| status(404)),
                Some(q) => q.front().cloned().unwrap_or_else(|| status(404)),
                None => status(404),
            }
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
