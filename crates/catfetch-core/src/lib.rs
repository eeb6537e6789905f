pub mod config;
pub mod logging;

pub mod batch;
pub mod chunk;
pub mod chunker;
pub mod fetcher;
pub mod ids;
pub mod limiter;
pub mod pipeline;
pub mod progress_log;
pub mod record;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod test_support;
