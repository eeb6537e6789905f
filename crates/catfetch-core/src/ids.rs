//! Identifier source: the candidate list, the logs of finished ids, and the
//! remaining work set.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Reads one identifier per line, in file order. Lines are trimmed and blank lines skipped.
pub fn load_ids(path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read identifier list: {}", path.display()))?;
    Ok(parse_lines(&data).collect())
}

/// Reads an append-only log into a set. A missing log is an empty set.
pub fn load_id_set(path: &Path) -> Result<HashSet<String>> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e).with_context(|| format!("read log: {}", path.display())),
    };
    Ok(parse_lines(&data).collect())
}

/// Counts lines in an append-only log, duplicates included. Missing log counts as 0.
pub fn count_entries(path: &Path) -> Result<usize> {
    match std::fs::read_to_string(path) {
        Ok(d) => Ok(parse_lines(&d).count()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e).with_context(|| format!("read log: {}", path.display())),
    }
}

/// Stable filter: every id of `all` not in `excluded`, in the original order.
pub fn remaining(all: &[String], excluded: &HashSet<String>) -> Vec<String> {
    all.iter()
        .filter(|id| !excluded.contains(id.as_str()))
        .cloned()
        .collect()
}

fn parse_lines(data: &str) -> impl Iterator<Item = String> + '_ {
    data.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}
