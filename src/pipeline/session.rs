//! Session state: counters, the done set and the pending buffer.
//!
//! Owned by the scheduler thread and only mutated through the entry points below, so no
//! locking is needed. The counters satisfy, in every reachable state:
//!
//! - `reads_found == discovered - duplicates_canceled`
//! - `reads_queued == reads_found - reads_processed`

use log::{debug, warn};
use std::collections::HashSet;

use crate::engine::progress::Counters;
use crate::{Batch, BatchId, FileResult};

#[derive(Debug)]
pub struct Session {
    chunk_size: usize,
    running: bool,
    scan_finished: bool,
    discovered: u64,
    duplicates_canceled: u64,
    reads_found: u64,
    reads_queued: u64,
    reads_processed: u64,
    next_batch_id: BatchId,
    files_done: HashSet<String>,
    /// Files dispatched in a batch whose results have not been merged yet.
    in_flight: HashSet<String>,
    active_batches: usize,
    pending: Vec<String>,
    watchdog_heartbeats: u64,
}

impl Session {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            running: true,
            scan_finished: false,
            discovered: 0,
            duplicates_canceled: 0,
            reads_found: 0,
            reads_queued: 0,
            reads_processed: 0,
            next_batch_id: 0,
            files_done: HashSet::new(),
            in_flight: HashSet::new(),
            active_batches: 0,
            pending: Vec::new(),
            watchdog_heartbeats: 0,
        }
    }

    /// Add a discovered file. Returns a full batch once the buffer reaches the chunk size.
    pub fn queue(&mut self, filename: String) -> Option<Batch> {
        if !self.running {
            return None;
        }
        self.pending.push(filename);
        self.discovered += 1;
        self.reads_found += 1;
        self.reads_queued += 1;
        if self.pending.len() >= self.chunk_size {
            self.flush()
        } else {
            None
        }
    }

    /// Add a file reported by the live watcher. Files already done are ignored; anything else
    /// resets the forced-flush watchdog.
    pub fn queue_live(&mut self, filename: String) -> Option<Batch> {
        if !self.running || self.files_done.contains(&filename) {
            return None;
        }
        self.watchdog_heartbeats = 0;
        self.queue(filename)
    }

    /// Turn the pending buffer into a batch.
    ///
    /// No-op when the buffer is empty or the session stopped. Files already done, already in
    /// flight, or listed twice in the buffer are canceled as duplicates. The batch id is
    /// consumed before filtering, so an emptied batch leaves a gap in the ids.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.pending.is_empty() || !self.running {
            return None;
        }
        let id = self.next_batch_id;
        self.next_batch_id += 1;
        let mut files = Vec::with_capacity(self.pending.len());
        let mut seen = HashSet::new();
        for filename in std::mem::take(&mut self.pending) {
            let duplicate = self.files_done.contains(&filename)
                || self.in_flight.contains(&filename)
                || !seen.insert(filename.clone());
            if duplicate {
                debug!("{} already queued or done, dropping", filename);
                self.cancel_duplicate();
            } else {
                files.push(filename);
            }
        }
        if files.is_empty() {
            return None;
        }
        self.in_flight.extend(files.iter().cloned());
        Some(Batch { id, files })
    }

    /// A batch was handed to the compute pool.
    pub fn batch_started(&mut self) {
        self.active_batches += 1;
    }

    /// A dispatched batch came back from the pool, whatever the outcome.
    pub fn settle_batch(&mut self, batch_id: BatchId) {
        if self.active_batches == 0 {
            warn!("batch {} settled with no active batches", batch_id);
            return;
        }
        self.active_batches -= 1;
    }

    /// Deduplicate a completed batch against the done set. Returns the new results, which must
    /// be passed to [`Session::results_written`] once the writers are done with them.
    pub fn merge_results(&mut self, batch_id: BatchId, results: Vec<FileResult>) -> Vec<FileResult> {
        let mut fresh = Vec::with_capacity(results.len());
        for result in results {
            self.in_flight.remove(&result.filename);
            if self.files_done.contains(&result.filename) {
                debug!(
                    "batch {}: {} was already processed, dropping",
                    batch_id, result.filename
                );
                self.cancel_duplicate();
                continue;
            }
            if result.status.is_okay() {
                self.files_done.insert(result.filename.clone());
            }
            fresh.push(result);
        }
        fresh
    }

    /// `count` merged results were persisted by every writer.
    pub fn results_written(&mut self, count: u64) {
        self.reads_processed += count;
        self.reads_queued = self.reads_queued.saturating_sub(count);
    }

    pub fn mark_scan_finished(&mut self) {
        self.scan_finished = true;
    }

    /// Stop the session. Returns false when it was already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    /// Live-mode watchdog, called every heartbeat. Forces a flush of an under-sized buffer when
    /// reads stayed queued for more than `threshold` heartbeats.
    pub fn watchdog_tick(&mut self, threshold: u64) -> Option<Batch> {
        if self.reads_queued == 0 {
            self.watchdog_heartbeats = 0;
            return None;
        }
        self.watchdog_heartbeats += 1;
        if self.watchdog_heartbeats <= threshold {
            return None;
        }
        self.watchdog_heartbeats = 0;
        if !self.pending.is_empty() {
            debug!("forcing flush of {} pending files", self.pending.len());
        }
        self.flush()
    }

    fn cancel_duplicate(&mut self) {
        self.duplicates_canceled += 1;
        self.reads_found = self.reads_found.saturating_sub(1);
        self.reads_queued = self.reads_queued.saturating_sub(1);
    }

    /// Both counter identities hold.
    pub fn counters_consistent(&self) -> bool {
        self.reads_found + self.duplicates_canceled == self.discovered
            && self.reads_queued + self.reads_processed == self.reads_found
    }

    /// Scan done and nothing left pending, in flight, or waiting on writers.
    pub fn is_drained(&self) -> bool {
        self.scan_finished
            && self.reads_queued == 0
            && self.active_batches == 0
            && self.pending.is_empty()
    }

    /// Every discovered file was processed.
    pub fn is_complete(&self) -> bool {
        self.scan_finished && self.reads_found == self.reads_processed
    }

    pub fn counters(&self) -> Counters {
        Counters {
            found: self.reads_found,
            queued: self.reads_queued,
            processed: self.reads_processed,
            active_batches: self.active_batches,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn scan_finished(&self) -> bool {
        self.scan_finished
    }

    pub fn reads_found(&self) -> u64 {
        self.reads_found
    }

    pub fn reads_queued(&self) -> u64 {
        self.reads_queued
    }

    pub fn reads_processed(&self) -> u64 {
        self.reads_processed
    }

    pub fn discovered(&self) -> u64 {
        self.discovered
    }

    pub fn duplicates_canceled(&self) -> u64 {
        self.duplicates_canceled
    }

    pub fn next_batch_id(&self) -> BatchId {
        self.next_batch_id
    }

    pub fn active_batches(&self) -> usize {
        self.active_batches
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_done(&self, filename: &str) -> bool {
        self.files_done.contains(filename)
    }

    pub fn files_done(&self) -> &HashSet<String> {
        &self.files_done
    }
}
