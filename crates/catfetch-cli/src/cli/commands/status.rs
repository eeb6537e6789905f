//! `catfetch status` – progress counts without touching the network.

use anyhow::Result;
use catfetch_core::config::CatfetchConfig;
use catfetch_core::pipeline;

pub fn run_status(cfg: &CatfetchConfig) -> Result<()> {
    let report = pipeline::status(cfg)?;
    println!("{:<12} {}", "SOURCE", report.source_ids);
    println!("{:<12} {}", "PROCESSED", report.processed);
    println!(
        "{:<12} {} ({} log lines)",
        "FAILED", report.failed_unique, report.failed_lines
    );
    println!("{:<12} {}", "REMAINING", report.remaining);
    println!(
        "{:<12} {} (chunk size {})",
        "CHUNKS", report.chunks, cfg.chunk_size
    );
    Ok(())
}
