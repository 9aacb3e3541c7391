//! MemTable Module
//!
//! In-memory ordered buffer for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Overwrite-on-duplicate-insert semantics
//! - Track a cumulative size estimate for flush triggers
//! - Ordered iteration for segment creation
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (segments must be written in ascending key order)
//! - Any ordered structure would do; only drain order and overwrite
//!   semantics are observable

mod table;

pub use table::MemTable;

/// A key/value pair as stored in the memtable and written to segments
pub type Entry = (Vec<u8>, Vec<u8>);
