//! Configuration for sparsekv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SparseKvError};

/// Main configuration for a sparsekv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding every segment and index file
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── seg_<N>                (flushed segment)
    ///     ├── indx_seg_<N>           (its sparse index)
    ///     ├── compacted_<N>          (compaction output)
    ///     └── indx_compacted_<N>
    pub data_dir: PathBuf,

    /// Distance in bytes between sparse index anchors
    pub block_size: u64,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Flush once the memtable's cumulative size estimate exceeds this (bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// How often the background compactor runs. `None` disables it.
    pub compaction_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./sparsekv_data"),
            block_size: 10,
            memtable_size_limit: 150,
            compaction_interval: Some(Duration::from_secs(10)),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SparseKvError::Config(
                "block_size must be greater than zero".to_string(),
            ));
        }

        if self.compaction_interval == Some(Duration::ZERO) {
            return Err(SparseKvError::Config(
                "compaction_interval must be non-zero (use None to disable)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sparse index block size (in bytes)
    pub fn block_size(mut self, size: u64) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the interval between background compactions
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = Some(interval);
        self
    }

    /// Run without a background compactor; compaction only happens on
    /// explicit `Engine::compact` calls.
    pub fn disable_background_compaction(mut self) -> Self {
        self.config.compaction_interval = None;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
