//! Segment Reader
//!
//! Opens existing segments and serves point lookups bounded by the sparse
//! index.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, SparseKvError};

use super::iterator::SegmentIterator;
use super::{
    index_file_name, parse_record, segment_file_name, Segment, SegmentKind, SparseIndex,
    RECORD_SEPARATOR,
};

impl Segment {
    /// Open an existing segment in `dir` and load its sparse index
    ///
    /// A segment without an index is a desync between the two files and is
    /// reported as corruption.
    pub fn open(dir: &Path, kind: SegmentKind, id: u64) -> Result<Self> {
        let path = dir.join(segment_file_name(kind, id));
        let index_path = dir.join(index_file_name(kind, id));

        if !index_path.exists() {
            return Err(SparseKvError::corrupt(
                &path,
                format!("sparse index {} is missing", index_path.display()),
            ));
        }

        let file_size = fs::metadata(&path)?.len();
        let index = SparseIndex::load(&index_path)?;

        if let Some(last) = index.anchors().last() {
            if last.offset >= file_size {
                return Err(SparseKvError::corrupt(
                    &index_path,
                    format!(
                        "anchor offset {} is past the end of a {} byte segment",
                        last.offset, file_size
                    ),
                ));
            }
        }

        Ok(Self {
            id,
            kind,
            path,
            index_path,
            index,
            file_size,
        })
    }

    /// Look up `key`, scanning only the range the sparse index allows
    ///
    /// Returns `Err(KeyNotFound)` if the key is not in this segment.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let (lower, upper) = self.index.bracket(key, self.file_size);
        self.read_range(lower, upper, key)
    }

    /// Scan records starting in `[lower, upper)` for `key`
    ///
    /// Stops at `upper`, at end of file, or at the first record whose key
    /// sorts after `key`.
    pub fn read_range(&self, lower: u64, upper: u64, key: &[u8]) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(lower))?;
        let mut reader = BufReader::new(file);

        let mut offset = lower;
        let mut line = Vec::new();

        while offset < upper {
            line.clear();
            let read = reader.read_until(RECORD_SEPARATOR, &mut line)?;
            if read == 0 {
                break;
            }

            let (record_key, value) = parse_record(&line).ok_or_else(|| {
                SparseKvError::corrupt(&self.path, format!("malformed record at offset {}", offset))
            })?;

            match record_key.cmp(key) {
                std::cmp::Ordering::Equal => return Ok(value.to_vec()),
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {}
            }

            offset += read as u64;
        }

        Err(SparseKvError::KeyNotFound)
    }

    /// Create an iterator over all records (for compaction, debugging)
    pub fn iter(&self) -> Result<SegmentIterator> {
        SegmentIterator::open(&self.path)
    }
}
