//! Sparse Index
//!
//! A subsample of `(key, offset)` anchors for one segment. Lookups binary
//! search the anchors for the byte range that could hold a key and scan only
//! that range.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{Result, SparseKvError};

use super::{FIELD_SEPARATOR, RECORD_SEPARATOR};

/// One sparse index row: the first record written after a block boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub key: Vec<u8>,
    pub offset: u64,
}

impl Anchor {
    pub fn new(key: impl Into<Vec<u8>>, offset: u64) -> Self {
        Self {
            key: key.into(),
            offset,
        }
    }
}

/// Anchors of one segment, ascending by key (and therefore by offset)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseIndex {
    anchors: Vec<Anchor>,
}

impl SparseIndex {
    /// Build an index from anchors already in ascending key order
    pub fn new(anchors: Vec<Anchor>) -> Self {
        Self { anchors }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Byte range `[lower, upper)` of the segment that could contain `key`
    ///
    /// Picks the largest anchor whose key is `<= key` as the lower bound and
    /// the anchor after it as the upper bound:
    /// - no anchors → `[0, file_size)`
    /// - key before the first anchor → `[0, first.offset)`
    /// - key at or after the last anchor → `[last.offset, file_size)`
    pub fn bracket(&self, key: &[u8], file_size: u64) -> (u64, u64) {
        // Number of anchors with anchor.key <= key
        let end = self
            .anchors
            .partition_point(|anchor| anchor.key.as_slice() <= key);

        if self.anchors.is_empty() {
            (0, file_size)
        } else if end == 0 {
            (0, self.anchors[0].offset)
        } else if end == self.anchors.len() {
            (self.anchors[end - 1].offset, file_size)
        } else {
            (self.anchors[end - 1].offset, self.anchors[end].offset)
        }
    }

    /// Load an index file, checking that anchors ascend by key and offset
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut anchors: Vec<Anchor> = Vec::new();
        let mut line = Vec::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            if reader.read_until(RECORD_SEPARATOR, &mut line)? == 0 {
                break;
            }
            line_no += 1;

            let anchor = parse_anchor(&line).ok_or_else(|| {
                SparseKvError::corrupt(path, format!("malformed index line {}", line_no))
            })?;

            if let Some(prev) = anchors.last() {
                if anchor.key <= prev.key || anchor.offset <= prev.offset {
                    return Err(SparseKvError::corrupt(
                        path,
                        format!("index line {} is out of order", line_no),
                    ));
                }
            }

            anchors.push(anchor);
        }

        Ok(Self { anchors })
    }

    /// Serialize as `<key> <offset>\n` lines
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for anchor in &self.anchors {
            writer.write_all(&anchor.key)?;
            writer.write_all(&[FIELD_SEPARATOR])?;
            writer.write_all(anchor.offset.to_string().as_bytes())?;
            writer.write_all(&[RECORD_SEPARATOR])?;
        }
        Ok(())
    }
}

fn parse_anchor(line: &[u8]) -> Option<Anchor> {
    let body = line.strip_suffix(&[RECORD_SEPARATOR])?;
    let split = body.iter().rposition(|&b| b == FIELD_SEPARATOR)?;
    let offset = std::str::from_utf8(&body[split + 1..]).ok()?.parse().ok()?;
    Some(Anchor::new(&body[..split], offset))
}
