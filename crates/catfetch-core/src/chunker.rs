//! Chunk planning: fixed-size ordered slices of the work set and 1-based range selection.

/// One contiguous slice of the work set. `index` is 1-based and stable for a given
/// work set and chunk size, so a range like `841..=2000` names the same chunks on rerun
/// as long as the processed log has not changed in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub ids: Vec<String>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Invalid chunk range selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkRangeError {
    #[error("chunk indices are 1-based; got start 0")]
    ZeroStart,
    #[error("start chunk {start} is after end chunk {end}")]
    Inverted { start: usize, end: usize },
    #[error("start chunk {start} is beyond the {available} available chunk(s)")]
    StartOutOfBounds { start: usize, available: usize },
}

/// Splits `ids` into chunks of `chunk_size`; only the last may be shorter.
///
/// A `chunk_size` of 0 yields a single chunk with everything (config validation
/// rejects 0 before a run gets here). Empty input yields no chunks.
pub fn partition(ids: &[String], chunk_size: usize) -> Vec<Chunk> {
    if ids.is_empty() {
        return Vec::new();
    }
    let size = if chunk_size == 0 { ids.len() } else { chunk_size };
    ids.chunks(size)
        .enumerate()
        .map(|(i, slice)| Chunk {
            index: i + 1,
            ids: slice.to_vec(),
        })
        .collect()
}

/// Keeps chunks `start..=end` (1-based, inclusive). `end` past the available count is
/// clamped; `start` must name an existing chunk.
pub fn select_range(
    chunks: Vec<Chunk>,
    start: usize,
    end: usize,
) -> Result<Vec<Chunk>, ChunkRangeError> {
    if start == 0 {
        return Err(ChunkRangeError::ZeroStart);
    }
    if start > end {
        return Err(ChunkRangeError::Inverted { start, end });
    }
    let available = chunks.len();
    if start > available {
        return Err(ChunkRangeError::StartOutOfBounds { start, available });
    }
    let end = end.min(available);
    Ok(chunks
        .into_iter()
        .skip(start - 1)
        .take(end - start + 1)
        .collect())
}
