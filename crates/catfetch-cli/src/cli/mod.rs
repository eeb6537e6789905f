//! CLI for the catfetch catalog fetcher.

mod commands;

use anyhow::Result;
use catfetch_core::config::{self, CatfetchConfig};
use catfetch_core::pipeline::ChunkRange;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use commands::{
    apply_run_overrides, run_completions, run_config, run_fetch, run_status, RunOverrides,
};

/// Top-level CLI for catfetch.
#[derive(Debug, Parser)]
#[command(name = "catfetch")]
#[command(about = "catfetch: chunked, resumable bulk fetch of catalog product records", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/catfetch/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every identifier not yet processed and write one batch file per chunk.
    Run {
        /// Identifier list (one per line). Overrides `ids_file`.
        #[arg(long, value_name = "FILE")]
        ids: Option<PathBuf>,
        /// Directory for batch files. Overrides `output_dir`.
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// First chunk to process (1-based).
        #[arg(long, value_name = "N")]
        start_chunk: Option<usize>,
        /// Last chunk to process (inclusive; clamped to the chunk count).
        #[arg(long, value_name = "M")]
        end_chunk: Option<usize>,
        /// Identifiers per chunk. Overrides `chunk_size`.
        #[arg(long, value_name = "K")]
        chunk_size: Option<usize>,
        /// Maximum requests in flight. Overrides `max_concurrent_requests`.
        #[arg(long, value_name = "C")]
        concurrency: Option<usize>,
        /// Do not retry identifiers already in the failed log.
        #[arg(long)]
        skip_failed: bool,
    },

    /// Show progress counts from the identifier list and logs (no network).
    Status {
        /// Identifier list (one per line). Overrides `ids_file`.
        #[arg(long, value_name = "FILE")]
        ids: Option<PathBuf>,
    },

    /// Print the config file path and the effective configuration.
    Config,

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell);
            return Ok(());
        }

        let (cfg, cfg_path) = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                ids,
                output,
                start_chunk,
                end_chunk,
                chunk_size,
                concurrency,
                skip_failed,
            } => {
                let mut cfg = cfg;
                apply_run_overrides(
                    &mut cfg,
                    RunOverrides {
                        ids,
                        output,
                        chunk_size,
                        concurrency,
                        skip_failed,
                    },
                );
                let range = ChunkRange {
                    start: start_chunk,
                    end: end_chunk,
                };
                run_fetch(&cfg, range).await?;
            }
            CliCommand::Status { ids } => {
                let mut cfg = cfg;
                if let Some(ids) = ids {
                    cfg.ids_file = ids;
                }
                run_status(&cfg)?;
            }
            CliCommand::Config => run_config(&cfg, &cfg_path)?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

fn load_config(explicit: Option<&std::path::Path>) -> Result<(CatfetchConfig, PathBuf)> {
    match explicit {
        Some(path) => Ok((config::load_from_path(path)?, path.to_path_buf())),
        None => Ok((config::load_or_init()?, config::config_path()?)),
    }
}

#[cfg(test)]
mod tests;
