//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate MemTable, Storage, and the compaction scheduler
//! - Handle concurrent read/write access
//! - Trigger flushes when the MemTable is full
//! - Flush buffered writes on close

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::scheduler::CompactionScheduler;
use crate::storage::segment::validate_entry;
use crate::storage::{CompactionStats, StorageManager};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - A flush swaps in a fresh MemTable while still holding `write_lock`,
///     so no write can land in a table that is being flushed
///
/// - **Reads** (get): No write_lock needed
///   - Clone the current MemTable `Arc` and probe it
///   - Fall through to StorageManager, which holds its segment read lock
///     for the scan
///   - The flushed segment is registered before the MemTable is replaced,
///     so a concurrent read always finds a key in one or the other
///
/// - **Compaction**: background thread, coordinates with flushes and reads
///   inside StorageManager
///
/// ## Limitations
/// No write-ahead log: writes still in the MemTable are lost if the process
/// dies before a flush. There are no timeouts; a stuck disk blocks the
/// calling `set`/`get`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Active in-memory table; replaced wholesale on every flush
    memtable: RwLock<Arc<MemTable>>,

    /// Persistent storage manager, shared with the compaction thread
    storage: Arc<StorageManager>,

    /// Serializes write operations (set/flush)
    write_lock: Mutex<()>,

    /// Background compaction, if enabled
    scheduler: Option<CompactionScheduler>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Load existing segments
    /// 3. Start background compaction (if configured)
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        let storage = Arc::new(StorageManager::open(&config.data_dir, config.block_size)?);

        let scheduler = match config.compaction_interval {
            Some(interval) => Some(CompactionScheduler::start(Arc::clone(&storage), interval)?),
            None => None,
        };

        tracing::info!(
            "Engine opened at {} (memtable limit {} bytes, block size {} bytes)",
            config.data_dir.display(),
            config.memtable_size_limit,
            config.block_size
        );

        Ok(Self {
            config,
            memtable: RwLock::new(Arc::new(MemTable::new())),
            storage,
            write_lock: Mutex::new(()),
            scheduler,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. Segments (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let memtable = Arc::clone(&self.memtable.read());
        if let Some(value) = memtable.get(key) {
            tracing::trace!("Key found in memtable");
            return Ok(Some(value));
        }

        self.storage.get(key)
    }

    /// Set a key-value pair
    ///
    /// The key may not contain a space or newline and the value may not
    /// contain a newline. Flushes the MemTable if this write pushes it over
    /// the size limit.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_entry(key, value)?;

        let _write_guard = self.write_lock.lock();

        self.memtable.read().put(key.to_vec(), value.to_vec());

        self.maybe_flush()?;

        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.flush_internal()
    }

    /// Run a compaction now
    ///
    /// Returns `Ok(None)` if there was nothing to merge or the background
    /// compactor is already running one.
    pub fn compact(&self) -> Result<Option<CompactionStats>> {
        self.storage.compact()
    }

    /// Close the engine gracefully
    ///
    /// Stops background compaction and flushes any buffered writes.
    pub fn close(mut self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }

        self.flush()?;

        tracing::info!("Engine closed");
        Ok(())
    }

    /// Flush if the MemTable has grown past the limit (write lock held)
    fn maybe_flush(&self) -> Result<bool> {
        let should_flush = self
            .memtable
            .read()
            .should_flush(self.config.memtable_size_limit);

        if should_flush {
            self.flush_internal()?;
        }

        Ok(should_flush)
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        let memtable = Arc::clone(&self.memtable.read());

        // Skip if memtable is empty
        if memtable.is_empty() {
            return Ok(());
        }

        // Step 1: Write it out; readers still see the old table meanwhile
        let segment = self.storage.flush(&memtable)?;

        // Step 2: Swap in a fresh table
        *self.memtable.write() = Arc::new(MemTable::new());

        tracing::info!(
            "Flushed {} entries ({} bytes estimated) to {}",
            memtable.entry_count(),
            memtable.size(),
            segment
        );

        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the current memtable size estimate
    pub fn memtable_size(&self) -> usize {
        self.memtable.read().size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.read().entry_count()
    }

    /// Get the number of live segments
    pub fn segment_count(&self) -> usize {
        self.storage.segment_count()
    }

    /// Get the storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
