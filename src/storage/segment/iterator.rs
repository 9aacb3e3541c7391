//! Segment Iterator
//!
//! Sequential iteration over all records in a segment.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, SparseKvError};
use crate::memtable::Entry;

use super::{parse_record, RECORD_SEPARATOR};

/// Iterator over segment records in file order
///
/// Yields an error and then stops at the first malformed record.
pub struct SegmentIterator {
    reader: BufReader<File>,
    path: PathBuf,
    /// Offset of the next record
    current_offset: u64,
    done: bool,
}

impl SegmentIterator {
    pub(super) fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            path: path.to_path_buf(),
            current_offset: 0,
            done: false,
        })
    }

    fn read_record(&mut self) -> Result<Option<Entry>> {
        let mut line = Vec::new();
        let read = self.reader.read_until(RECORD_SEPARATOR, &mut line)?;
        if read == 0 {
            return Ok(None);
        }

        let (key, value) = parse_record(&line).ok_or_else(|| {
            SparseKvError::corrupt(
                &self.path,
                format!("malformed record at offset {}", self.current_offset),
            )
        })?;
        let entry = (key.to_vec(), value.to_vec());

        self.current_offset += read as u64;
        Ok(Some(entry))
    }
}

impl Iterator for SegmentIterator {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_record() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
