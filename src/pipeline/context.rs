//! Events delivered to the scheduler and the cancel flag shared with monitor threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::pool::PoolError;
use crate::{BatchId, BatchOutcome, FileResult};

/// Where a discovered file came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Scan,
    Live,
}

/// Everything the monitor threads and the pools report back to the scheduler.
#[derive(Debug)]
pub enum SessionEvent {
    /// A file matching the suffix, relative to the input root.
    Discovered { filename: String, origin: Origin },
    ScanFinished,
    ScanFailed(String),
    /// The compute pool finished with a batch.
    BatchSettled {
        batch_id: BatchId,
        outcome: Result<BatchOutcome, PoolError>,
    },
    /// The I/O pool ran every writer over a batch's new results.
    WritesSettled {
        batch_id: BatchId,
        outcome: Result<Vec<FileResult>, String>,
    },
}

/// Cooperative cancellation for the scan and watch threads.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
