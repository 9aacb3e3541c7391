//! Storage Module
//!
//! Persistent storage layer: immutable, line-oriented segment files, each
//! with a sparse offset index.
//!
//! ## Responsibilities
//! - Persist flushed MemTables in sorted order
//! - Point lookups bounded to one index block per segment
//! - Compaction: merge all segments, newest value wins
//!
//! ## Directory Layout
//! ```text
//! {data_dir}/
//!   ├── compacted_3         ┐ compaction output (replaced seg_1, seg_2)
//!   ├── indx_compacted_3    ┘
//!   ├── seg_4               ┐
//!   ├── indx_seg_4          │ flushed after the compaction started
//!   ├── seg_5               │
//!   └── indx_seg_5          ┘
//! ```
//!
//! Every segment takes its number from one counter, so newer data always
//! lives in a higher-numbered segment, compacted or not.

pub mod compaction;
pub mod segment;
mod manager;

pub use compaction::CompactionStats;
pub use manager::StorageManager;
pub use segment::{Anchor, Segment, SegmentKind, SparseIndex};
