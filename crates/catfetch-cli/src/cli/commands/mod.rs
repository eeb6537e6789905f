//! CLI command handlers, one file per command.

mod completions;
mod config;
mod run;
mod status;

pub use completions::run_completions;
pub use config::run_config;
pub use run::{apply_run_overrides, run_fetch, watch_interrupts, Interrupt, RunOverrides};
pub use status::run_status;
