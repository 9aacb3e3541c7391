//! Segment Module
//!
//! Immutable on-disk segment files and their sparse indexes.
//!
//! ## File Format
//! ```text
//! seg_<N> / compacted_<N>
//! ┌─────────────────────────────────────────────┐
//! │ <key> <value>\n                             │
//! │ <key> <value>\n      (ascending key order)  │
//! │ ...                                         │
//! └─────────────────────────────────────────────┘
//!
//! indx_seg_<N> / indx_compacted_<N>
//! ┌─────────────────────────────────────────────┐
//! │ <key> <byte offset into segment>\n          │
//! │ ...                  (ascending key order)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Keys may not contain the field separator or a newline. Values may not
//! contain a newline; a record is split at its first space, so values may
//! contain spaces.

mod builder;
mod index;
mod iterator;
mod reader;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, SparseKvError};

pub use builder::SegmentBuilder;
pub use index::{Anchor, SparseIndex};
pub use iterator::SegmentIterator;

// =============================================================================
// Shared Constants (used by builder, reader, iterator, index)
// =============================================================================

/// Separates key from value (segments) and key from offset (indexes)
pub(crate) const FIELD_SEPARATOR: u8 = b' ';

/// Terminates every record
pub(crate) const RECORD_SEPARATOR: u8 = b'\n';

/// Prefix of every sparse index file name
pub(crate) const INDEX_PREFIX: &str = "indx_";

/// Suffix of files still being written
pub(crate) const TMP_SUFFIX: &str = ".tmp";

// =============================================================================
// Segment Kind & Naming
// =============================================================================

/// Where a segment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Written by a memtable flush
    Regular,

    /// Written by the compactor
    Compacted,
}

impl SegmentKind {
    fn prefix(self) -> &'static str {
        match self {
            SegmentKind::Regular => "seg",
            SegmentKind::Compacted => "compacted",
        }
    }
}

/// `seg_7`, `compacted_12`
pub fn segment_file_name(kind: SegmentKind, id: u64) -> String {
    format!("{}_{}", kind.prefix(), id)
}

/// `indx_seg_7`, `indx_compacted_12`
pub fn index_file_name(kind: SegmentKind, id: u64) -> String {
    format!("{}{}", INDEX_PREFIX, segment_file_name(kind, id))
}

/// Parse a segment file name back into its kind and sequence number
///
/// "seg_42" → Some((Regular, 42)), "indx_seg_42" → None
pub fn parse_segment_file_name(name: &str) -> Option<(SegmentKind, u64)> {
    let (prefix, id) = name.split_once('_')?;
    let kind = match prefix {
        "seg" => SegmentKind::Regular,
        "compacted" => SegmentKind::Compacted,
        _ => return None,
    };
    // Reject "seg_", anything with a suffix such as ".tmp", and zero padding
    // ("seg_07" is not the file `segment_file_name` writes for id 7)
    if id.is_empty() || id.starts_with('0') || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok().map(|id| (kind, id))
}

// =============================================================================
// Entry Validation
// =============================================================================

/// Check that a key/value pair can be represented in the line format
pub fn validate_entry(key: &[u8], value: &[u8]) -> Result<()> {
    if key.contains(&FIELD_SEPARATOR) || key.contains(&RECORD_SEPARATOR) {
        return Err(SparseKvError::InvalidKey(format!(
            "key {:?} contains a space or newline",
            String::from_utf8_lossy(key)
        )));
    }

    if value.contains(&RECORD_SEPARATOR) {
        return Err(SparseKvError::InvalidValue(format!(
            "value for key {:?} contains a newline",
            String::from_utf8_lossy(key)
        )));
    }

    Ok(())
}

/// Split a raw line (including its trailing newline) into key and value
///
/// Returns None if the line is not newline-terminated or has no separator.
pub(crate) fn parse_record(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let body = line.strip_suffix(&[RECORD_SEPARATOR])?;
    let split = body.iter().position(|&b| b == FIELD_SEPARATOR)?;
    Some((&body[..split], &body[split + 1..]))
}

/// `path` with `.tmp` appended
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

// =============================================================================
// Segment Handle
// =============================================================================

/// Handle to one immutable segment and its in-memory sparse index
///
/// Segments never change after creation, so the index is loaded once and
/// shared by every lookup that holds the handle.
#[derive(Debug)]
pub struct Segment {
    /// Sequence number (unique for the life of the data directory)
    id: u64,
    /// Regular or compacted
    kind: SegmentKind,
    /// Path to the segment file
    path: PathBuf,
    /// Path to the sparse index file
    index_path: PathBuf,
    /// Anchors loaded from the index file
    index: SparseIndex,
    /// Segment file size in bytes
    file_size: u64,
}

impl Segment {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn index(&self) -> &SparseIndex {
        &self.index
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// File name, e.g. `seg_3`
    pub fn name(&self) -> String {
        segment_file_name(self.kind, self.id)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
