//! Storage Manager
//!
//! Manages the set of segments and coordinates reads/writes/compaction.
//!
//! ## Responsibilities
//! - Discover existing segments on startup
//! - Search segments newest → oldest for reads
//! - Create new segments from MemTable flushes
//! - Merge segments and delete the inputs (compaction)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, SparseKvError};
use crate::memtable::{Entry, MemTable};

use super::compaction::{merge_segments, CompactionStats};
use super::segment::{
    parse_segment_file_name, Segment, SegmentBuilder, SegmentKind, INDEX_PREFIX, TMP_SUFFIX,
};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `segments`: RwLock. Lookups hold the read lock for their whole scan;
///   compaction takes the write lock to swap in its output and delete the
///   inputs, so a file is never removed under an in-flight read.
/// - `next_segment_id`: atomic counter, never reset, never reused.
/// - `creation_lock`: makes "allocate id + write + register" for flushes
///   atomic with the compactor's "snapshot inputs + allocate output id".
///   A compacted segment therefore sorts after all of its inputs and before
///   every segment flushed while it was being merged.
/// - `compaction_lock`: at most one compaction in flight; taken with
///   `try_lock` so a concurrent request is skipped rather than queued.
pub struct StorageManager {
    /// Directory where segments are stored
    data_dir: PathBuf,

    /// Sparse index block size for new segments
    block_size: u64,

    /// Live segments, ordered newest → oldest by sequence number
    segments: RwLock<Vec<Arc<Segment>>>,

    /// Next sequence number to hand out
    next_segment_id: AtomicU64,

    creation_lock: Mutex<()>,

    compaction_lock: Mutex<()>,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove leftovers of interrupted writes and deletes
    /// 3. Open every segment (loads sparse indexes into RAM)
    /// 4. Order by sequence number descending (newest first)
    pub fn open(path: &Path, block_size: u64) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut found: Vec<(SegmentKind, u64)> = Vec::new();
        let mut index_files: Vec<(PathBuf, String)> = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();

            if let Some(published) = name.strip_suffix(TMP_SUFFIX) {
                // Interrupted segment or index write; never published
                if is_segment_or_index(published) {
                    tracing::warn!("Removing incomplete file {}", file_path.display());
                    fs::remove_file(&file_path)?;
                }
            } else if let Some(segment_name) = name.strip_prefix(INDEX_PREFIX) {
                if parse_segment_file_name(segment_name).is_some() {
                    index_files.push((file_path, segment_name.to_string()));
                }
            } else if let Some(parsed) = parse_segment_file_name(&name) {
                found.push(parsed);
            }
        }

        // An index whose segment is gone is left over from an interrupted delete
        for (index_path, segment_name) in index_files {
            if !path.join(&segment_name).exists() {
                tracing::warn!("Removing orphaned sparse index {}", index_path.display());
                fs::remove_file(&index_path)?;
            }
        }

        // Sort newest first (highest ID first)
        found.sort_by(|a, b| b.1.cmp(&a.1));

        let mut segments = Vec::with_capacity(found.len());
        for (kind, id) in &found {
            segments.push(Arc::new(Segment::open(path, *kind, *id)?));
        }

        // Next ID = max + 1, or 1 if no segments exist
        let next_id = found.first().map(|&(_, id)| id + 1).unwrap_or(1);

        tracing::info!(
            "Opened storage at {} with {} segment(s), next segment id {}",
            path.display(),
            segments.len(),
            next_id
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            block_size,
            segments: RwLock::new(segments),
            next_segment_id: AtomicU64::new(next_id),
            creation_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
        })
    }

    /// Get a value by key (searches all segments newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found
    /// - `Ok(None)`: key not in any segment
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // Held for the whole scan so compaction cannot delete a file under us
        let segments = self.segments.read();

        for segment in segments.iter() {
            match segment.get(key) {
                Ok(value) => {
                    tracing::trace!("Found key in {}", segment);
                    return Ok(Some(value));
                }
                Err(SparseKvError::KeyNotFound) => continue, // Not in this segment
                Err(e) => return Err(e),                     // Real error
            }
        }

        Ok(None)
    }

    /// Flush a MemTable to a new segment
    ///
    /// Writes the MemTable's sorted entries to `seg_<N>` and registers it as
    /// the newest segment.
    pub fn flush(&self, memtable: &MemTable) -> Result<Arc<Segment>> {
        if memtable.is_empty() {
            return Err(SparseKvError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        self.create_segment(SegmentKind::Regular, memtable.iter())
    }

    /// Write `entries` (ascending by key) as a new segment under the next
    /// sequence number and make it visible to lookups
    pub fn create_segment<I>(&self, kind: SegmentKind, entries: I) -> Result<Arc<Segment>>
    where
        I: IntoIterator<Item = Entry>,
    {
        let _creation = self.creation_lock.lock();

        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let segment = Arc::new(self.write_segment(kind, id, entries)?);

        self.register(Arc::clone(&segment));

        tracing::debug!(
            "Created {} ({} bytes, {} anchors)",
            segment,
            segment.file_size(),
            segment.index().len()
        );

        Ok(segment)
    }

    /// All live segments ordered by sequence number
    pub fn list_segments(&self, newest_first: bool) -> Vec<Arc<Segment>> {
        let mut segments = self.segments.read().clone();
        if !newest_first {
            segments.reverse();
        }
        segments
    }

    /// Remove a segment from the live set and delete its files
    ///
    /// Fails if either the segment file or its index is already gone.
    pub fn delete_segment(&self, segment: &Segment) -> Result<()> {
        let mut segments = self.segments.write();
        Self::unregister_and_remove(&mut segments, segment)
    }

    /// Merge every live segment into one compacted segment
    ///
    /// Returns `Ok(None)` when there is nothing to merge or another
    /// compaction is already running. The compacted segment is fully written
    /// and synced before any input is removed; if deleting an input fails the
    /// error is returned, and rerunning compaction later merges the leftovers
    /// to the same result.
    pub fn compact(&self) -> Result<Option<CompactionStats>> {
        let Some(_running) = self.compaction_lock.try_lock() else {
            tracing::warn!("Compaction already in progress, skipping");
            return Ok(None);
        };

        let (inputs, output_id) = {
            let _creation = self.creation_lock.lock();

            let inputs = self.list_segments(false);
            let already_compact =
                inputs.len() == 1 && inputs[0].kind() == SegmentKind::Compacted;
            if inputs.is_empty() || already_compact {
                tracing::debug!("Nothing to compact");
                return Ok(None);
            }

            let output_id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
            (inputs, output_id)
        };

        let started = Instant::now();
        tracing::info!("Compacting {} segment(s) into id {}", inputs.len(), output_id);

        let merged = merge_segments(&inputs)?;
        let entries_written = merged.len();
        let output = Arc::new(self.write_segment(SegmentKind::Compacted, output_id, merged)?);

        {
            let mut segments = self.segments.write();

            Self::insert_ordered(&mut segments, Arc::clone(&output));

            // Inputs still listed after a failed delete sit below the output
            for input in &inputs {
                Self::unregister_and_remove(&mut segments, input)?;
            }
        }

        let stats = CompactionStats {
            input_ids: inputs.iter().map(|s| s.id()).collect(),
            output_id,
            entries_written,
            bytes_in: inputs.iter().map(|s| s.file_size()).sum(),
            bytes_out: output.file_size(),
        };

        tracing::info!(
            "Compaction into {} done in {:?}: {} segment(s), {} entries, {} bytes reclaimed",
            output,
            started.elapsed(),
            stats.input_ids.len(),
            stats.entries_written,
            stats.bytes_reclaimed()
        );

        Ok(Some(stats))
    }

    /// Get the number of live segments
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Get the next segment ID (for testing/debugging)
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_segment<I>(&self, kind: SegmentKind, id: u64, entries: I) -> Result<Segment>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut builder = SegmentBuilder::new(&self.data_dir, kind, id, self.block_size)?;
        for (key, value) in entries {
            builder.add(&key, &value)?;
        }
        builder.finish()
    }

    fn register(&self, segment: Arc<Segment>) {
        let mut segments = self.segments.write();
        Self::insert_ordered(&mut segments, segment);
    }

    /// Insert keeping newest → oldest order
    fn insert_ordered(segments: &mut Vec<Arc<Segment>>, segment: Arc<Segment>) {
        let position = segments
            .iter()
            .position(|s| s.id() < segment.id())
            .unwrap_or(segments.len());
        segments.insert(position, segment);
    }

    /// Drop `segment` from the live list, then delete its files
    ///
    /// Shared by `delete_segment` and the compactor; the caller holds the
    /// registry write lock.
    fn unregister_and_remove(segments: &mut Vec<Arc<Segment>>, segment: &Segment) -> Result<()> {
        let position = segments
            .iter()
            .position(|s| s.id() == segment.id())
            .ok_or_else(|| {
                SparseKvError::Storage(format!("{} is not a live segment", segment))
            })?;
        segments.remove(position);

        Self::remove_files(segment)
    }

    /// Delete a segment's body and index, surfacing a missing file as a
    /// segment/index desync
    fn remove_files(segment: &Segment) -> Result<()> {
        for path in [segment.path(), segment.index_path()] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(SparseKvError::corrupt(
                        path,
                        format!("{} vanished before it was deleted", segment),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("Deleted {}", segment);
        Ok(())
    }
}

/// `seg_3`, `indx_compacted_4`; anything else in the directory is not ours
fn is_segment_or_index(name: &str) -> bool {
    let segment_name = name.strip_prefix(INDEX_PREFIX).unwrap_or(name);
    parse_segment_file_name(segment_name).is_some()
}
