//! Compaction Scheduler
//!
//! Background thread that runs compaction on a fixed interval.
//!
//! ## Design
//! - One thread per engine, driven by a crossbeam `tick` channel
//! - Shutdown is signalled by dropping the sender half of a second channel
//! - A tick that lands while a compaction is still running is skipped by
//!   `StorageManager::compact`; `tick` itself never queues more than one
//!   pending tick

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, select, tick, Receiver, Sender};

use crate::error::Result;
use crate::storage::StorageManager;

/// Handle to the background compaction thread
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct CompactionScheduler {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl CompactionScheduler {
    /// Spawn the compaction thread
    pub fn start(storage: Arc<StorageManager>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("sparsekv-compactor".to_string())
            .spawn(move || run(storage, interval, shutdown_rx))?;

        tracing::info!("Background compaction every {:?}", interval);

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the thread and wait for it; waits for an in-flight compaction
    /// to finish first
    pub fn shutdown(&mut self) {
        // Disconnecting the channel wakes the select below
        drop(self.shutdown.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Compaction thread panicked");
            }
        }
    }
}

impl Drop for CompactionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(storage: Arc<StorageManager>, interval: Duration, shutdown: Receiver<()>) {
    let ticker = tick(interval);

    loop {
        select! {
            recv(ticker) -> _ => {
                tracing::debug!("Compaction tick");
                match storage.compact() {
                    Ok(Some(stats)) => tracing::debug!(
                        "Scheduled compaction merged {} segment(s) into id {}",
                        stats.input_ids.len(),
                        stats.output_id
                    ),
                    Ok(None) => {}
                    // No retry; the next tick tries again from scratch
                    Err(e) => tracing::error!("Scheduled compaction failed: {}", e),
                }
            }
            recv(shutdown) -> _ => break,
        }
    }

    tracing::debug!("Compaction thread stopped");
}
