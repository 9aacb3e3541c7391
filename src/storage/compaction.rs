//! Compaction
//!
//! Merges segments into one, keeping only the newest value for every key.
//! The merge itself lives here; `StorageManager::compact` decides what to
//! merge and swaps the result in.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;

use super::segment::Segment;

/// Outcome of one compaction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    /// Sequence numbers of the merged (and now deleted) segments, oldest first
    pub input_ids: Vec<u64>,
    /// Sequence number of the compacted segment
    pub output_id: u64,
    /// Distinct keys in the compacted segment
    pub entries_written: usize,
    /// Total size of the inputs in bytes
    pub bytes_in: u64,
    /// Size of the compacted segment in bytes
    pub bytes_out: u64,
}

impl CompactionStats {
    /// Bytes freed on disk (segment bodies only)
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_in.saturating_sub(self.bytes_out)
    }
}

/// Overlay `inputs` oldest → newest; a later segment's value for a key
/// replaces an earlier one
///
/// The result is ordered by key, so it can be written straight into a new
/// segment with a valid sparse index.
pub fn merge_segments(inputs: &[Arc<Segment>]) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
    let mut merged = BTreeMap::new();

    for segment in inputs {
        for entry in segment.iter()? {
            let (key, value) = entry?;
            merged.insert(key, value);
        }
    }

    Ok(merged)
}
