//! `catfetch run` – fetch the remaining identifiers chunk by chunk.

use anyhow::Result;
use catfetch_core::config::CatfetchConfig;
use catfetch_core::pipeline::{self, ChunkRange};
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-run values given on the command line.
#[derive(Debug, Default)]
pub struct RunOverrides {
    pub ids: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub skip_failed: bool,
}

pub fn apply_run_overrides(cfg: &mut CatfetchConfig, o: RunOverrides) {
    if let Some(ids) = o.ids {
        cfg.ids_file = ids;
    }
    if let Some(dir) = o.output {
        cfg.output_dir = dir;
    }
    if let Some(n) = o.chunk_size {
        cfg.chunk_size = n;
    }
    if let Some(n) = o.concurrency {
        cfg.max_concurrent_requests = n;
    }
    if o.skip_failed {
        cfg.skip_failed = true;
    }
}

/// Exit status after a forced stop (128 + SIGINT).
pub const FORCED_EXIT_CODE: i32 = 130;

/// What the interrupt watcher saw before it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Signal handling failed before any interrupt arrived.
    None,
    /// One interrupt: `cancel` was fired and the run winds down.
    Graceful,
    /// A second interrupt arrived while winding down.
    Forced,
}

/// First signal cancels `cancel`; a second one reports [`Interrupt::Forced`].
pub async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return Interrupt::None;
    }
    eprintln!("\ninterrupted: finishing in-flight requests, no new ones will start");
    eprintln!("press Ctrl-C again to stop immediately (this chunk's fetched records are then not saved)");
    cancel.cancel();
    match next_signal().await {
        Ok(()) => Interrupt::Forced,
        Err(_) => Interrupt::Graceful,
    }
}

pub async fn run_fetch(cfg: &CatfetchConfig, range: ChunkRange) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, on_signal).await == Interrupt::Forced {
            // Log lines are flushed as written; only the current chunk's batch is lost.
            eprintln!("stopping now; the current chunk's batch was not written");
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    let started = Instant::now();
    let result = pipeline::run_pipeline_with(cfg, &range, cancel, |cs| match &cs.batch_path {
        Some(path) => println!(
            "chunk {:>5}: saved {}/{} products to {}",
            cs.index,
            cs.succeeded,
            cs.total,
            path.display()
        ),
        None => println!(
            "chunk {:>5}: no valid products ({} failed, {} skipped)",
            cs.index, cs.failed, cs.skipped
        ),
    })
    .await;
    signal_task.abort();
    let summary = result?;

    println!(
        "{} identifiers in list, {} already done, {} chunk(s) selected",
        summary.total_ids, summary.already_done, summary.chunks_selected
    );
    println!(
        "fetched {}, failed {}, skipped {}; {} batch file(s) in {:.1}s",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.batches.len(),
        started.elapsed().as_secs_f64()
    );
    if summary.cancelled {
        println!(
            "stopped after {} of {} chunk(s); rerun to continue",
            summary.chunks_completed, summary.chunks_selected
        );
    }
    Ok(())
}
