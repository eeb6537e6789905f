//! Chunk processor: fetch every identifier of one chunk under the limiter, then
//! write the chunk's batch file.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchWriter;
use crate::chunker::Chunk;
use crate::fetcher::{FetchResult, Fetcher};
use crate::limiter::ConcurrencyLimiter;

/// What happened to one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSummary {
    pub index: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Batch file, if at least one record was fetched.
    pub batch_path: Option<PathBuf>,
}

/// Runs one fetch task per identifier and joins them all before writing the batch.
///
/// Records are kept in completion order. Once `cancel` fires, tasks still waiting
/// for a slot finish as `Skipped`; fetches already in flight run to completion and
/// their records are still written, since they are already in the processed log.
pub async fn process_chunk(
    chunk: &Chunk,
    fetcher: &Arc<Fetcher>,
    limiter: &ConcurrencyLimiter,
    batches: &BatchWriter,
    cancel: &CancellationToken,
) -> Result<ChunkSummary> {
    tracing::info!(chunk = chunk.index, ids = chunk.len(), "processing chunk");

    let mut tasks = JoinSet::new();
    for id in &chunk.ids {
        let id = id.clone();
        let fetcher = Arc::clone(fetcher);
        let limiter = limiter.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                slot = limiter.acquire() => Some(slot),
            };
            let result = match slot {
                Some(_slot) if !cancel.is_cancelled() => fetcher.fetch(&id).await,
                _ => FetchResult::Skipped,
            };
            (id, result)
        });
    }

    let mut summary = ChunkSummary {
        index: chunk.index,
        total: chunk.len(),
        ..ChunkSummary::default()
    };
    let mut records = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, FetchResult::Success(record))) => records.push(record),
            Ok((_, FetchResult::Failure(_))) => summary.failed += 1,
            Ok((_, FetchResult::Skipped)) => summary.skipped += 1,
            Err(e) => {
                // Nothing was logged for this id, so the next run picks it up again.
                tracing::error!(chunk = chunk.index, "fetch task died: {}", e);
                summary.failed += 1;
            }
        }
    }
    summary.succeeded = records.len();

    if records.is_empty() {
        tracing::info!(
            chunk = chunk.index,
            "chunk has no valid products; skipping file creation"
        );
        return Ok(summary);
    }

    let writer = batches.clone();
    let index = chunk.index;
    let path = tokio::task::spawn_blocking(move || writer.write(index, &records))
        .await
        .map_err(|e| anyhow::anyhow!("batch writer join: {}", e))??;
    tracing::info!(
        chunk = chunk.index,
        saved = summary.succeeded,
        total = summary.total,
        path = %path.display(),
        "saved batch"
    );
    summary.batch_path = Some(path);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::read_batch;
    use crate::progress_log::MemoryProgressLog;
    use crate::retry::RetryPolicy;
    use crate::test_support::{ok_json, product, status, timed_out, ScriptedTransport};
    use std::collections::HashSet;
    use std::time::Duration;

    fn chunk(index: usize, ids: &[&str]) -> Chunk {
        Chunk {
            index,
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            throttle_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        }
    }

    fn setup(
        transport: ScriptedTransport,
    ) -> (Arc<Fetcher>, Arc<ScriptedTransport>, Arc<MemoryProgressLog>) {
        let transport = Arc::new(transport);
        let log = Arc::new(MemoryProgressLog::new());
        let fetcher = Arc::new(Fetcher::new(transport.clone(), policy(), log.clone()));
        (fetcher, transport, log)
    }

    #[tokio::test]
    async fn mixed_outcomes_write_only_successes() {
        let transport = ScriptedTransport::new()
            .script("1", vec![product("1")])
            .script("2", vec![status(404)])
            .script("3", vec![product("3")])
            .script("4", vec![ok_json("not json")])
            .script("5", vec![timed_out()]);
        let (fetcher, _t, log) = setup(transport);
        let dir = tempfile::tempdir().unwrap();
        let batches = BatchWriter::create(dir.path()).unwrap();
        let limiter = ConcurrencyLimiter::new(2);

        let summary = process_chunk(
            &chunk(4, &["1", "2", "3", "4", "5"]),
            &fetcher,
            &limiter,
            &batches,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.index, 4);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.skipped, 0);

        let path = summary.batch_path.expect("batch written");
        let ids: HashSet<String> = read_batch(&path).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["1", "3"].iter().map(|s| s.to_string()).collect());

        let mut processed = log.processed_ids();
        processed.sort();
        assert_eq!(processed, vec!["1", "3"]);
        let mut failed = log.failed_ids();
        failed.sort();
        assert_eq!(failed, vec!["2", "4", "5"]);
        assert_eq!(limiter.in_use(), 0);
    }

    #[tokio::test]
    async fn all_failures_write_no_file() {
        let transport = ScriptedTransport::new();
        let (fetcher, _t, log) = setup(transport);
        let dir = tempfile::tempdir().unwrap();
        let batches = BatchWriter::create(dir.path()).unwrap();

        let summary = process_chunk(
            &chunk(1, &["a", "b"]),
            &fetcher,
            &ConcurrencyLimiter::new(4),
            &batches,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.failed, 2);
        assert!(summary.batch_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(log.failed_ids().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn limiter_caps_in_flight_fetches() {
        let ids: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        let mut transport = ScriptedTransport::with_delay(Duration::from_millis(5));
        for id in &ids {
            transport = transport.script(id, vec![product(id)]);
        }
        let (fetcher, t, log) = setup(transport);
        let dir = tempfile::tempdir().unwrap();
        let batches = BatchWriter::create(dir.path()).unwrap();
        let limiter = ConcurrencyLimiter::new(10);

        let summary = process_chunk(
            &Chunk { index: 1, ids },
            &fetcher,
            &limiter,
            &batches,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.succeeded, 100);
        assert_eq!(t.total_calls(), 100);
        assert!(t.peak_active() <= 10, "peak {}", t.peak_active());
        assert!(limiter.peak() <= 10);
        assert_eq!(limiter.in_use(), 0);
        assert_eq!(log.processed_ids().len(), 100);
        assert_eq!(read_batch(&summary.batch_path.unwrap()).unwrap().len(), 100);
    }

    #[tokio::test]
    async fn cancelled_before_start_skips_everything() {
        let transport = ScriptedTransport::new().script("1", vec![product("1")]);
        let (fetcher, t, log) = setup(transport);
        let dir = tempfile::tempdir().unwrap();
        let batches = BatchWriter::create(dir.path()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = process_chunk(
            &chunk(2, &["1", "2", "3"]),
            &fetcher,
            &ConcurrencyLimiter::new(2),
            &batches,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.succeeded, 0);
        assert!(summary.batch_path.is_none());
        assert_eq!(t.total_calls(), 0);
        assert!(log.processed_ids().is_empty());
        assert!(log.failed_ids().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_mid_chunk_finishes_in_flight_and_skips_queued() {
        let ids = ["1", "2", "3", "4", "5"];
        let mut transport = ScriptedTransport::with_delay(Duration::from_millis(300));
        for id in ids {
            transport = transport.script(id, vec![product(id)]);
        }
        let (fetcher, t, log) = setup(transport);
        let dir = tempfile::tempdir().unwrap();
        let batches = BatchWriter::create(dir.path()).unwrap();
        let limiter = ConcurrencyLimiter::new(1);
        let cancel = CancellationToken::new();

        let trigger = {
            let cancel = cancel.clone();
            let t = Arc::clone(&t);
            tokio::spawn(async move {
                while t.total_calls() == 0 {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
                cancel.cancel();
            })
        };
        let summary = process_chunk(&chunk(3, &ids), &fetcher, &limiter, &batches, &cancel)
            .await
            .unwrap();
        trigger.await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 4);
        assert_eq!(t.total_calls(), 1);
        assert_eq!(limiter.in_use(), 0);

        let processed = log.processed_ids();
        assert_eq!(processed.len(), 1);
        assert!(log.failed_ids().is_empty());

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1, "one complete batch, no temp files");
        assert_eq!(Some(&files[0]), summary.batch_path.as_ref());
        let saved: Vec<String> = read_batch(&files[0])
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(saved, processed);
    }
}
