//! Segment Builder
//!
//! Writes sorted key-value entries to a new segment file and builds its
//! sparse index alongside.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SparseKvError};

use super::{
    index_file_name, segment_file_name, tmp_path, validate_entry, Anchor, Segment, SegmentKind,
    SparseIndex, FIELD_SEPARATOR, RECORD_SEPARATOR,
};

/// Builder for creating new segments from sorted entries
///
/// Records go to `<name>.tmp` first. `finish()` fsyncs both files and renames
/// the index and then the segment into place, so a segment file under its
/// final name is always complete and always has an index.
pub struct SegmentBuilder {
    /// Sequence number of the segment being written
    id: u64,
    kind: SegmentKind,
    /// Final paths
    path: PathBuf,
    index_path: PathBuf,
    /// Buffered writer over the temp segment file
    writer: BufWriter<File>,
    /// Anchor spacing in bytes
    block_size: u64,
    /// Current write position (start of the next record)
    current_offset: u64,
    /// Block of the most recent anchor (block 0 is never anchored)
    current_block: u64,
    anchors: Vec<Anchor>,
    /// Last key written, for the ascending-order check
    last_key: Option<Vec<u8>>,
    entry_count: u64,
}

impl SegmentBuilder {
    /// Create a new segment builder in `dir`
    ///
    /// Call `add()` in strictly ascending key order, then `finish()`.
    pub fn new(dir: &Path, kind: SegmentKind, id: u64, block_size: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(SparseKvError::Config(
                "block_size must be greater than zero".to_string(),
            ));
        }

        let path = dir.join(segment_file_name(kind, id));
        let index_path = dir.join(index_file_name(kind, id));

        if path.exists() {
            return Err(SparseKvError::Storage(format!(
                "segment {} already exists",
                path.display()
            )));
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path(&path))?;

        Ok(Self {
            id,
            kind,
            path,
            index_path,
            writer: BufWriter::new(file),
            block_size,
            current_offset: 0,
            current_block: 0,
            anchors: Vec::new(),
            last_key: None,
            entry_count: 0,
        })
    }

    /// Add a key-value pair (must be called in ascending key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_entry(key, value)?;

        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(SparseKvError::Storage(format!(
                    "segment entries out of order: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        // Anchor the first record that starts past the last anchored block
        let block = self.current_offset / self.block_size;
        if block > self.current_block {
            self.anchors.push(Anchor::new(key, self.current_offset));
            self.current_block = block;
        }

        self.writer.write_all(key)?;
        self.writer.write_all(&[FIELD_SEPARATOR])?;
        self.writer.write_all(value)?;
        self.writer.write_all(&[RECORD_SEPARATOR])?;

        self.current_offset += (key.len() + value.len() + 2) as u64;
        self.last_key = Some(key.to_vec());
        self.entry_count += 1;

        Ok(())
    }

    /// Number of records written so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Finish building: sync the segment, write its index, publish both
    pub fn finish(self) -> Result<Segment> {
        if self.entry_count == 0 {
            return Err(SparseKvError::Storage(
                "Cannot finish a segment with no entries".to_string(),
            ));
        }

        let file = self.writer.into_inner().map_err(|e| {
            SparseKvError::Storage(format!("Failed to flush segment: {}", e))
        })?;
        file.sync_all()?;

        let index = SparseIndex::new(self.anchors);
        let index_tmp = tmp_path(&self.index_path);
        {
            let mut writer = BufWriter::new(File::create(&index_tmp)?);
            index.write_to(&mut writer)?;
            let file = writer.into_inner().map_err(|e| {
                SparseKvError::Storage(format!("Failed to flush sparse index: {}", e))
            })?;
            file.sync_all()?;
        }

        // Index first: a published segment must never lack its index
        fs::rename(&index_tmp, &self.index_path)?;
        fs::rename(tmp_path(&self.path), &self.path)?;
        if let Some(dir) = self.path.parent() {
            sync_dir(dir)?;
        }

        Ok(Segment {
            id: self.id,
            kind: self.kind,
            path: self.path,
            index_path: self.index_path,
            index,
            file_size: self.current_offset,
        })
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
