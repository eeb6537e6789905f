//! Minimal HTTP/1.1 catalog server for integration tests.
//!
//! Answers `GET /products/{id}` from a per-id script of replies. The last reply of a
//! script repeats; unknown ids get 404. Each connection serves one request and closes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    /// Sleep before answering (to trip the client's request timeout).
    pub delay: Duration,
}

impl Reply {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn product(id: &str) -> Self {
        Self::json(format!(
            r#"{{"id": {id}, "name": "Product {id}", "url_key": "p-{id}", "price": 1000, "images": [{{"large_url": "https://img/{id}.jpg"}}]}}"#
        ))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, Vec<Reply>>,
    calls: HashMap<String, usize>,
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct CatalogServer {
    base_url: String,
    state: Arc<Mutex<State>>,
}

impl CatalogServer {
    /// Base URL ending in `/products/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.state.lock().unwrap().calls.get(id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }
}

/// Starts a server in a background thread answering from `scripts`.
pub fn start(scripts: HashMap<String, Vec<Reply>>) -> CatalogServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State {
        scripts,
        calls: HashMap::new(),
    }));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    CatalogServer {
        base_url: format!("http://127.0.0.1:{}/products/", port),
        state,
    }
}

/// Every id in `ids` answers with a well-formed product.
pub fn start_with_products(ids: &[&str]) -> CatalogServer {
    start(
        ids.iter()
            .map(|id| (id.to_string(), vec![Reply::product(id)]))
            .collect(),
    )
}

fn handle(mut stream: std::net::TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let Some(id) = parse_product_id(request) else {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    };

    let reply = {
        let mut st = state.lock().unwrap();
        let n = {
            let c = st.calls.entry(id.clone()).or_insert(0);
            *c += 1;
            *c
        };
        match st.scripts.get(&id) {
            Some(script) if !script.is_empty() => script[(n - 1).min(script.len() - 1)].clone(),
            _ => Reply::status(404),
        }
    };
    if !reply.delay.is_zero() {
        thread::sleep(reply.delay);
    }
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        reply.body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(reply.body.as_bytes());
}

/// Returns the id from `GET /products/{id} HTTP/1.1`.
fn parse_product_id(request: &str) -> Option<String> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.eq_ignore_ascii_case("GET") {
        return None;
    }
    let path = parts.next()?;
    let id = path.strip_prefix("/products/")?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
