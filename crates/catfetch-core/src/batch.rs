//! Batch output files: one pretty-printed JSON array of records per chunk.
//!
//! Records are serialized into a temp file in the output directory, synced, then
//! persisted under the final name without clobbering, so a batch file is either
//! absent or complete.

use anyhow::{Context, Result};
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::record::Record;

/// Writes batch files into one output directory.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    dir: PathBuf,
}

impl BatchWriter {
    /// Uses `dir`, creating it if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a chunk's batch: `products_{index}_{YYYYmmdd_HHMMSS}.json`.
    pub fn file_name(chunk_index: usize, stamp: &str) -> String {
        format!("products_{}_{}.json", chunk_index, stamp)
    }

    /// Writes `records` for `chunk_index` and returns the final path.
    /// Runs on the calling thread; use `spawn_blocking` from async code.
    pub fn write(&self, chunk_index: usize, records: &[Record]) -> Result<PathBuf> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".batch-")
            .suffix(".part")
            .tempfile_in(&self.dir)
            .with_context(|| format!("create temp batch in {}", self.dir.display()))?;
        {
            let mut out = std::io::BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut out, records).context("serialize batch")?;
            out.write_all(b"\n")?;
            out.flush().context("flush batch")?;
        }
        tmp.as_file().sync_all().context("sync batch")?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let base = Self::file_name(chunk_index, &stamp);
        let mut candidate = self.dir.join(&base);
        let mut n = 1u32;
        loop {
            match tmp.persist_noclobber(&candidate) {
                Ok(_) => return Ok(candidate),
                Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    tmp = e.file;
                    n += 1;
                    candidate = self
                        .dir
                        .join(format!("products_{}_{}-{}.json", chunk_index, stamp, n));
                }
                Err(e) => {
                    return Err(e.error)
                        .with_context(|| format!("persist batch: {}", candidate.display()))
                }
            }
        }
    }
}

/// Reads a batch file back (used by status reporting and tests).
pub fn read_batch(path: &Path) -> Result<Vec<Record>> {
    let data = std::fs::read(path).with_context(|| format!("read batch: {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parse batch: {}", path.display()))
}
