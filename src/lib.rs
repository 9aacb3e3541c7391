//! # sparsekv
//!
//! An embedded, log-structured key-value store with:
//! - An ordered in-memory buffer (MemTable) for recent writes
//! - Immutable, line-oriented segment files flushed from the buffer
//! - A sparse offset index per segment, bounding each lookup to one block
//! - Background compaction that merges segments, newest value wins
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Engine::set / get                       │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌─────────────┐   size > limit   ┌──────────────┐
//!               │  MemTable   │ ───────────────► │    Flush     │
//!               │  (RwLock)   │                  └──────┬───────┘
//!               └─────────────┘                         │
//!                                                       ▼
//!   ┌──────────────────────┐  merge + delete   ┌────────────────┐
//!   │ CompactionScheduler  │ ────────────────► │ StorageManager │
//!   │  (background thread) │                   │ seg_N + indx_  │
//!   └──────────────────────┘                   └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sparsekv::{Config, Engine};
//!
//! # fn main() -> sparsekv::Result<()> {
//! let engine = Engine::open(Config::builder().data_dir("/tmp/sparsekv").build())?;
//! engine.set(b"foo", b"bar")?;
//! assert_eq!(engine.get(b"foo")?, Some(b"bar".to_vec()));
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod memtable;
pub mod storage;
pub mod scheduler;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SparseKvError, Result};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of sparsekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
