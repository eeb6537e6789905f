//! `catfetch config` – show where the config lives and what is in effect.

use anyhow::Result;
use catfetch_core::config::CatfetchConfig;
use std::path::Path;

pub fn run_config(cfg: &CatfetchConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    if let Err(e) = cfg.validate() {
        println!("# warning: {}", e);
    }
    Ok(())
}
