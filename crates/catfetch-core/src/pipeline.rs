//! Whole-run orchestration: plan the work set, then process chunks one after another.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchWriter;
use crate::chunk::{process_chunk, ChunkSummary};
use crate::chunker::{self, Chunk};
use crate::config::CatfetchConfig;
use crate::fetcher::Fetcher;
use crate::ids;
use crate::limiter::ConcurrencyLimiter;
use crate::progress_log::ProgressLog;
use crate::transport::{CurlTransport, Transport};

/// 1-based inclusive chunk selection. Missing bounds mean "from the first" / "to the last".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl ChunkRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Read-only result of planning a run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Identifiers in the source list.
    pub total_ids: usize,
    /// Source identifiers excluded because they are already logged.
    pub already_done: usize,
    /// Chunks in the whole work set, before range selection.
    pub chunks_total: usize,
    /// Chunks this run will process, with their original indices.
    pub chunks: Vec<Chunk>,
}

impl RunPlan {
    pub fn remaining(&self) -> usize {
        self.total_ids - self.already_done
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_ids: usize,
    pub already_done: usize,
    pub chunks_selected: usize,
    pub chunks_completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub batches: Vec<PathBuf>,
    pub cancelled: bool,
}

/// Counts shown by `catfetch status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub source_ids: usize,
    pub processed: usize,
    pub failed_unique: usize,
    pub failed_lines: usize,
    pub remaining: usize,
    pub chunks: usize,
}

/// Validates the config, loads the identifier list and logs, and selects the chunks to run.
/// Everything that can fail before fetching fails here.
pub fn plan_run(cfg: &CatfetchConfig, range: &ChunkRange) -> Result<RunPlan> {
    cfg.validate()?;
    let all = ids::load_ids(&cfg.ids_file)?;
    let mut excluded = ids::load_id_set(&cfg.processed_log)?;
    if cfg.skip_failed {
        excluded.extend(ids::load_id_set(&cfg.failed_log)?);
    }
    let work = ids::remaining(&all, &excluded);
    let chunks = chunker::partition(&work, cfg.chunk_size);
    let chunks_total = chunks.len();
    let chunks = if range.is_all() {
        chunks
    } else {
        chunker::select_range(
            chunks,
            range.start.unwrap_or(1),
            range.end.unwrap_or(usize::MAX),
        )?
    };
    tracing::debug!(
        total = all.len(),
        remaining = work.len(),
        chunks_total,
        selected = chunks.len(),
        "run planned"
    );
    Ok(RunPlan {
        total_ids: all.len(),
        already_done: all.len() - work.len(),
        chunks_total,
        chunks,
    })
}

/// Progress counts without touching the network.
pub fn status(cfg: &CatfetchConfig) -> Result<StatusReport> {
    let plan = plan_run(cfg, &ChunkRange::all())?;
    let processed = ids::load_id_set(&cfg.processed_log)?;
    let failed = ids::load_id_set(&cfg.failed_log)?;
    Ok(StatusReport {
        source_ids: plan.total_ids,
        processed: processed.len(),
        failed_unique: failed.len(),
        failed_lines: ids::count_entries(&cfg.failed_log)?,
        remaining: plan.remaining(),
        chunks: plan.chunks_total,
    })
}

/// Runs the pipeline against the configured catalog API.
pub async fn run_pipeline(
    cfg: &CatfetchConfig,
    range: &ChunkRange,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    run_pipeline_with(cfg, range, cancel, |_| {}).await
}

/// Like [`run_pipeline`], calling `on_chunk` after each chunk finishes.
pub async fn run_pipeline_with<F>(
    cfg: &CatfetchConfig,
    range: &ChunkRange,
    cancel: CancellationToken,
    on_chunk: F,
) -> Result<RunSummary>
where
    F: FnMut(&ChunkSummary),
{
    let plan = plan_run(cfg, range)?;
    let transport = CurlTransport::new(
        &cfg.api_base_url,
        &cfg.headers,
        cfg.request_timeout(),
        cfg.connect_timeout(),
    )?;
    execute(cfg, plan, Arc::new(transport), cancel, on_chunk).await
}

/// Runs the pipeline over an arbitrary transport.
pub async fn run_with_transport<F>(
    cfg: &CatfetchConfig,
    range: &ChunkRange,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    on_chunk: F,
) -> Result<RunSummary>
where
    F: FnMut(&ChunkSummary),
{
    let plan = plan_run(cfg, range)?;
    execute(cfg, plan, transport, cancel, on_chunk).await
}

async fn execute<F>(
    cfg: &CatfetchConfig,
    plan: RunPlan,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    mut on_chunk: F,
) -> Result<RunSummary>
where
    F: FnMut(&ChunkSummary),
{
    let mut summary = RunSummary {
        total_ids: plan.total_ids,
        already_done: plan.already_done,
        chunks_selected: plan.chunks.len(),
        ..RunSummary::default()
    };
    if plan.chunks.is_empty() {
        tracing::info!("nothing to fetch");
        return Ok(summary);
    }

    let batches = BatchWriter::create(&cfg.output_dir)?;
    let (log, writer) =
        ProgressLog::open(&cfg.processed_log, &cfg.failed_log, cfg.failed_log_mode).await?;
    let fetcher = Arc::new(Fetcher::new(
        transport,
        cfg.retry_config().to_policy(),
        Arc::new(log),
    ));
    let limiter = ConcurrencyLimiter::new(cfg.max_concurrent_requests);
    tracing::info!(
        chunks = plan.chunks.len(),
        remaining = plan.remaining(),
        concurrency = limiter.max(),
        "run started"
    );

    let mut outcome = Ok(());
    for chunk in &plan.chunks {
        if cancel.is_cancelled() {
            break;
        }
        match process_chunk(chunk, &fetcher, &limiter, &batches, &cancel).await {
            Ok(cs) => {
                summary.succeeded += cs.succeeded;
                summary.failed += cs.failed;
                summary.skipped += cs.skipped;
                if cs.skipped == 0 {
                    summary.chunks_completed += 1;
                }
                if let Some(path) = &cs.batch_path {
                    summary.batches.push(path.clone());
                }
                on_chunk(&cs);
            }
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    // Dropping the fetcher drops the last log handle, letting the writer drain and exit.
    drop(fetcher);
    let counts = writer.finish().await?;
    outcome?;

    summary.cancelled = cancel.is_cancelled();
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        batches = summary.batches.len(),
        logged_processed = counts.processed,
        logged_failed = counts.failed,
        cancelled = summary.cancelled,
        "run finished"
    );
    Ok(summary)
}
