//! Progress log: append-only records of identifiers that reached a terminal outcome.
//!
//! Fetch tasks report through the `ProgressSink` trait. The file-backed log sends
//! each entry over a channel to one writer task, which owns both files and writes
//! every entry as a single flushed line, so concurrent reporters never interleave.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::FailedLogMode;
use crate::ids;

/// Receives terminal outcomes. Implementations must tolerate concurrent callers.
pub trait ProgressSink: Send + Sync {
    fn processed(&self, id: &str);
    fn failed(&self, id: &str);
}

#[derive(Debug)]
enum Entry {
    Processed(String),
    Failed(String),
}

/// Lines appended by the writer during this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCounts {
    pub processed: usize,
    pub failed: usize,
    /// Failures not written because the id was already in the failed log (dedupe mode).
    pub failed_suppressed: usize,
}

/// Cloneable handle to the file-backed log.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    tx: mpsc::UnboundedSender<Entry>,
}

/// Owns the writer task. Call `finish` after every `ProgressLog` clone is dropped.
#[derive(Debug)]
pub struct ProgressLogWriter {
    handle: JoinHandle<LogCounts>,
}

impl ProgressLog {
    /// Opens (creating if needed) both log files for appending and starts the writer task.
    pub async fn open(
        processed_path: &Path,
        failed_path: &Path,
        mode: FailedLogMode,
    ) -> Result<(ProgressLog, ProgressLogWriter)> {
        let processed = open_append(processed_path).await?;
        let failed = open_append(failed_path).await?;
        let already_failed = match mode {
            FailedLogMode::Audit => None,
            FailedLogMode::Dedupe => Some(ids::load_id_set(failed_path)?),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let state = WriterState {
            processed,
            failed,
            processed_path: processed_path.to_path_buf(),
            failed_path: failed_path.to_path_buf(),
            already_failed,
            counts: LogCounts::default(),
        };
        let handle = tokio::spawn(run_writer(rx, state));
        Ok((ProgressLog { tx }, ProgressLogWriter { handle }))
    }

    fn send(&self, entry: Entry) {
        if self.tx.send(entry).is_err() {
            tracing::warn!("progress log writer is gone; entry dropped");
        }
    }
}

impl ProgressSink for ProgressLog {
    fn processed(&self, id: &str) {
        self.send(Entry::Processed(id.to_string()));
    }

    fn failed(&self, id: &str) {
        self.send(Entry::Failed(id.to_string()));
    }
}

impl ProgressLogWriter {
    /// Waits for the writer to drain the channel and sync both files.
    /// Only returns once all `ProgressLog` handles have been dropped.
    pub async fn finish(self) -> Result<LogCounts> {
        self.handle
            .await
            .map_err(|e| anyhow::anyhow!("progress log writer join: {}", e))
    }
}

async fn open_append(path: &Path) -> Result<tokio::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("open log for append: {}", path.display()))
}

struct WriterState {
    processed: tokio::fs::File,
    failed: tokio::fs::File,
    processed_path: PathBuf,
    failed_path: PathBuf,
    already_failed: Option<HashSet<String>>,
    counts: LogCounts,
}

async fn run_writer(mut rx: mpsc::UnboundedReceiver<Entry>, mut st: WriterState) -> LogCounts {
    while let Some(entry) = rx.recv().await {
        match entry {
            Entry::Processed(id) => {
                if append_line(&mut st.processed, &id).await.is_err() {
                    tracing::warn!(id = %id, path = %st.processed_path.display(), "processed log append failed");
                } else {
                    st.counts.processed += 1;
                }
            }
            Entry::Failed(id) => {
                if let Some(seen) = st.already_failed.as_mut() {
                    if !seen.insert(id.clone()) {
                        st.counts.failed_suppressed += 1;
                        continue;
                    }
                }
                if append_line(&mut st.failed, &id).await.is_err() {
                    tracing::warn!(id = %id, path = %st.failed_path.display(), "failed log append failed");
                } else {
                    st.counts.failed += 1;
                }
            }
        }
    }
    for (file, path) in [
        (&st.processed, &st.processed_path),
        (&st.failed, &st.failed_path),
    ] {
        if file.sync_all().await.is_err() {
            tracing::warn!(path = %path.display(), "log sync failed");
        }
    }
    tracing::debug!(counts = ?st.counts, "progress log writer finished");
    st.counts
}

async fn append_line(file: &mut tokio::fs::File, id: &str) -> std::io::Result<()> {
    let mut line = String::with_capacity(id.len() + 1);
    line.push_str(id);
    line.push('\n');
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

/// In-memory sink for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryProgressLog {
    processed: std::sync::Mutex<Vec<String>>,
    failed: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed_ids(&self) -> Vec<String> {
        self.processed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[cfg(test)]
impl ProgressSink for MemoryProgressLog {
    fn processed(&self, id: &str) {
        self.processed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(id.to_string());
    }

    fn failed(&self, id: &str) {
        self.failed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(id.to_string());
    }
}
