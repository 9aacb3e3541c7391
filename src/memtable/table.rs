//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::Entry;

/// In-memory table for recent writes
///
/// The size estimate only ever grows: it is the sum of key and value lengths
/// of every insert, including inserts that overwrote an existing key.
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock)
    ///
    /// Returns the size estimate after the insert.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let added = key.len() + value.len();

        let mut data = self.data.write();
        data.insert(key, value);

        self.size.fetch_add(added, Ordering::SeqCst) + added
    }

    /// Cumulative size estimate in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Number of distinct keys
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// True once the size estimate exceeds `size_limit`
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() > size_limit
    }

    /// Snapshot of all entries in ascending key order
    ///
    /// The snapshot is detached from the table; later writes do not show up
    /// in it.
    pub fn iter(&self) -> Vec<Entry> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
