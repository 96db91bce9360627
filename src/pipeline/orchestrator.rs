//! Session driver: one scheduler thread reacting to monitor events, pool completions, the
//! heartbeat and operator interrupts.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, after, never, select, tick, unbounded};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::context::{CancelFlag, Origin, SessionEvent};
use super::error_handler::{log_scheduler_panic, log_worker_fault};
use super::session::Session;
use super::walk::{Scanner, spawn_scan_thread};
use super::watch::{ChangeWatcher, NotifyWatcher, spawn_watch_thread};
use crate::engine::pool::{ComputePool, PoolError};
use crate::engine::process_pool::ProcessPool;
use crate::engine::progress::ProgressDisplay;
use crate::engine::tools::canonical_root;
use crate::output::{FinalSummary, FinalSummaryTracker, ResultWriter, build_inventory, open_writers};
use crate::utils::config::{HeartbeatConsts, IO_POOL_SIZE, forced_flush_heartbeats};
use crate::utils::notice;
use crate::{Batch, BatchId, BatchOutcome, Config, FileResult};

type Writers = Arc<Vec<Arc<dyn ResultWriter>>>;

/// External collaborators of a session.
pub struct Collaborators {
    pub pool: Box<dyn ComputePool>,
    pub writers: Vec<Arc<dyn ResultWriter>>,
    /// Used in live mode only.
    pub watcher: Option<Box<dyn ChangeWatcher>>,
    /// Any message (or disconnect) requests a stop.
    pub interrupt: Option<Receiver<()>>,
}

impl Collaborators {
    pub fn new(pool: Box<dyn ComputePool>) -> Self {
        Self {
            pool,
            writers: Vec::new(),
            watcher: None,
            interrupt: None,
        }
    }

    /// Worker processes, the writers enabled by `config` and, in live mode, a notify watcher.
    /// The watch is established here so nothing written during the scan is missed.
    pub fn standard(config: &Config) -> Result<Self> {
        let pool = ProcessPool::from_config(config).context("start worker processes")?;
        let writers = open_writers(config)?;
        let watcher: Option<Box<dyn ChangeWatcher>> = if config.live {
            Some(Box::new(NotifyWatcher::new(&config.input_dir)?))
        } else {
            None
        };
        Ok(Self {
            pool: Box::new(pool),
            writers,
            watcher,
            interrupt: None,
        })
    }

    pub fn with_writers(mut self, writers: Vec<Arc<dyn ResultWriter>>) -> Self {
        self.writers = writers;
        self
    }

    pub fn with_watcher(mut self, watcher: Box<dyn ChangeWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }
}

struct Scheduler {
    config: Arc<Config>,
    session: Session,
    pool: Box<dyn ComputePool>,
    writers: Writers,
    io_pool: rayon::ThreadPool,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    /// Batches waiting out the analysis start delay, in deadline order.
    delayed: VecDeque<(Instant, Batch)>,
    pending_writes: usize,
    tracker: FinalSummaryTracker,
    display: Option<ProgressDisplay>,
    cancel: CancelFlag,
    watchdog_threshold: u64,
}

impl Scheduler {
    fn drive(&mut self, interrupt: Receiver<()>) {
        let events = self.events_rx.clone();
        let heartbeat = tick(HeartbeatConsts::HEARTBEAT);
        loop {
            if !self.session.is_running() {
                break;
            }
            if !self.config.live && self.session.is_drained() && self.pending_writes == 0 {
                break;
            }
            let next_release = match self.delayed.front() {
                Some((at, _)) => after(at.saturating_duration_since(Instant::now())),
                None => never(),
            };
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => self.handle_event(event),
                    Err(_) => self.stop("event channel closed"),
                },
                recv(heartbeat) -> _ => self.heartbeat(),
                recv(next_release) -> _ => self.release_due_batches(),
                recv(interrupt) -> _ => self.stop("Interrupted"),
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Discovered { filename, origin } => {
                let batch = match origin {
                    Origin::Scan => self.session.queue(filename),
                    Origin::Live => self.session.queue_live(filename),
                };
                if let Some(batch) = batch {
                    self.dispatch(batch);
                }
            }
            SessionEvent::ScanFinished => {
                debug!("scan finished: {} files", self.session.discovered());
                self.session.mark_scan_finished();
                if let Some(batch) = self.session.flush() {
                    self.dispatch(batch);
                }
            }
            SessionEvent::ScanFailed(msg) => {
                error!("{}", msg);
                self.stop("input scan failed");
            }
            SessionEvent::BatchSettled { batch_id, outcome } => {
                self.session.settle_batch(batch_id);
                self.batch_settled(batch_id, outcome);
            }
            SessionEvent::WritesSettled { batch_id, outcome } => {
                self.pending_writes = self.pending_writes.saturating_sub(1);
                match outcome {
                    Ok(results) => self.results_written(batch_id, &results),
                    Err(msg) => {
                        error!("batch {}: {}", batch_id, msg);
                        self.stop("writing results failed");
                    }
                }
            }
        }
    }

    fn batch_settled(&mut self, batch_id: BatchId, outcome: Result<BatchOutcome, PoolError>) {
        match outcome {
            Ok(BatchOutcome::Completed { results }) => {
                if !self.session.is_running() {
                    debug!("batch {}: session stopped, discarding results", batch_id);
                    return;
                }
                let fresh = self.session.merge_results(batch_id, results);
                debug!("batch {}: {} new results", batch_id, fresh.len());
                if fresh.is_empty() {
                    self.check_counters();
                } else {
                    self.submit_writes(batch_id, fresh);
                }
            }
            Ok(BatchOutcome::WorkerFault { message, trace }) => {
                log_worker_fault(&message, &trace);
                self.stop("worker fault");
            }
            Err(PoolError::Terminated) => debug!("batch {}: canceled", batch_id),
            Err(e) if self.session.is_running() => {
                error!("batch {}: {}", batch_id, e);
                self.stop("worker pool failed");
            }
            Err(e) => debug!("batch {}: {} (stopping)", batch_id, e),
        }
    }

    fn results_written(&mut self, batch_id: BatchId, results: &[FileResult]) {
        self.tracker.feed_results(results);
        self.session.results_written(results.len() as u64);
        debug!(
            "batch {}: written; {} of {} processed",
            batch_id,
            self.session.reads_processed(),
            self.session.reads_found()
        );
        self.check_counters();
    }

    fn check_counters(&self) {
        let consistent = self.session.counters_consistent();
        if !consistent {
            error!("session counters out of sync: {:?}", self.session.counters());
        }
        debug_assert!(consistent, "session counters out of sync");
    }

    fn dispatch(&mut self, batch: Batch) {
        let delay = self.config.analysis_start_delay;
        if delay.is_zero() {
            self.submit(batch);
        } else {
            debug!("batch {}: starting in {:?}", batch.id, delay);
            self.delayed.push_back((Instant::now() + delay, batch));
        }
    }

    fn release_due_batches(&mut self) {
        let now = Instant::now();
        while self.delayed.front().is_some_and(|(at, _)| *at <= now) {
            if let Some((_, batch)) = self.delayed.pop_front() {
                self.submit(batch);
            }
        }
    }

    fn submit(&mut self, batch: Batch) {
        if !self.session.is_running() {
            return;
        }
        let batch_id = batch.id;
        debug!("batch {}: dispatching {} files", batch_id, batch.len());
        self.session.batch_started();
        let tx = self.events_tx.clone();
        self.pool.submit(
            batch,
            Arc::clone(&self.config),
            Box::new(move |outcome| {
                let _ = tx.send(SessionEvent::BatchSettled { batch_id, outcome });
            }),
        );
    }

    fn submit_writes(&mut self, batch_id: BatchId, results: Vec<FileResult>) {
        self.pending_writes += 1;
        let writers = Arc::clone(&self.writers);
        let tx = self.events_tx.clone();
        self.io_pool.spawn(move || {
            let written = panic::catch_unwind(AssertUnwindSafe(|| write_all(&writers, &results)));
            let outcome = match written {
                Ok(Ok(())) => Ok(results),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(_) => Err("writer panicked".to_string()),
            };
            let _ = tx.send(SessionEvent::WritesSettled { batch_id, outcome });
        });
    }

    fn heartbeat(&mut self) {
        let counters = self.session.counters();
        if let Some(display) = self.display.as_mut() {
            display.refresh(&counters, self.session.scan_finished());
        }
        if self.config.live
            && let Some(batch) = self.session.watchdog_tick(self.watchdog_threshold)
        {
            self.dispatch(batch);
        }
    }

    /// Stop once: cancel monitors and drop batches still waiting out their delay.
    fn stop(&mut self, reason: &str) {
        if !self.session.stop() {
            return;
        }
        warn!("Stopping session: {}", reason);
        notice(self.config.quiet, &format!("{}.", reason));
        self.cancel.cancel();
        self.delayed.clear();
    }

    /// After the pool was terminated: wait for writer jobs already running and account
    /// for them. Pool completions are only settled.
    fn drain(&mut self) {
        while self.pending_writes > 0 {
            match self.events_rx.recv() {
                Ok(SessionEvent::WritesSettled { batch_id, outcome }) => {
                    self.pending_writes -= 1;
                    match outcome {
                        Ok(results) => self.results_written(batch_id, &results),
                        Err(msg) => error!("batch {}: {}", batch_id, msg),
                    }
                }
                Ok(SessionEvent::BatchSettled { batch_id, .. }) => {
                    self.session.settle_batch(batch_id)
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }

    fn close_writers(&self) {
        for writer in self.writers.iter() {
            if let Err(e) = writer.close() {
                error!("closing {} writer: {:#}", writer.name(), e);
            }
        }
    }
}

fn write_all(writers: &[Arc<dyn ResultWriter>], results: &[FileResult]) -> Result<()> {
    for writer in writers {
        writer
            .write_results(results)
            .with_context(|| format!("{} writer", writer.name()))?;
    }
    Ok(())
}

fn join_monitors(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("monitor thread panicked");
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run a processing session to completion (finite mode) or until stopped (live mode,
/// interrupt, fatal error).
///
/// Returns the final summary when the scan finished and every discovered file was processed,
/// `None` for an incomplete or aborted run. Never panics and never returns an error.
pub fn run(config: &Config, collaborators: Collaborators) -> Option<FinalSummary> {
    let started = Instant::now();
    let root: PathBuf = match canonical_root(&config.input_dir) {
        Ok(root) => root,
        Err(e) => {
            error!("{:#}", e);
            return None;
        }
    };
    let config = Arc::new(Config {
        input_dir: root.clone(),
        ..config.clone()
    });
    let io_pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(IO_POOL_SIZE)
        .thread_name(|i| format!("{}-io-{}", env!("CARGO_PKG_NAME"), i))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            error!("build I/O thread pool: {}", e);
            return None;
        }
    };

    let Collaborators {
        pool,
        writers,
        watcher,
        interrupt,
    } = collaborators;
    let (events_tx, events_rx) = unbounded();
    let mut scheduler = Scheduler {
        session: Session::new(config.chunk_size),
        pool,
        writers: Arc::new(writers),
        io_pool,
        events_tx,
        events_rx,
        delayed: VecDeque::new(),
        pending_writes: 0,
        tracker: FinalSummaryTracker::new(),
        display: ProgressDisplay::for_session(config.live, config.quiet),
        cancel: CancelFlag::new(),
        watchdog_threshold: forced_flush_heartbeats(config.analysis_start_delay),
        config: Arc::clone(&config),
    };

    notice(config.quiet, &format!("Processing *{} files", config.suffix));
    if config.live {
        notice(config.quiet, "Entering LIVE mode.");
        if !config.quiet {
            println!("\nPress Ctrl-C when the sequencing run is finished.");
        }
    }
    info!("Scanning {}", root.display());
    let mut monitors = Vec::new();
    let scanner = Scanner::new(&root, &config.suffix);
    match spawn_scan_thread(scanner, scheduler.events_tx.clone(), scheduler.cancel.clone()) {
        Ok(handle) => monitors.push(handle),
        Err(e) => {
            error!("start scan: {:#}", e);
            scheduler.stop("input scan failed");
        }
    }
    if config.live && scheduler.session.is_running() {
        match watcher {
            Some(watcher) => {
                let spawned = spawn_watch_thread(
                    watcher,
                    root.clone(),
                    config.suffix.clone(),
                    scheduler.events_tx.clone(),
                    scheduler.cancel.clone(),
                );
                match spawned {
                    Ok(handle) => monitors.push(handle),
                    Err(e) => {
                        error!("start watcher: {:#}", e);
                        scheduler.stop("watching the input failed");
                    }
                }
            }
            None => warn!("live mode without a change watcher; only the initial scan is processed"),
        }
    }

    let interrupt = interrupt.unwrap_or_else(never);
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| scheduler.drive(interrupt))) {
        log_scheduler_panic(&panic_text(payload.as_ref()));
        scheduler.stop("unhandled error");
    }

    scheduler.cancel.cancel();
    scheduler.pool.terminate_all();
    scheduler.drain();
    let counters = scheduler.session.counters();
    if let Some(display) = scheduler.display.as_mut() {
        display.finish(&counters, scheduler.session.scan_finished());
    }
    scheduler.close_writers();
    join_monitors(monitors);
    info!(
        "{} processed, {} found, {} duplicates dropped",
        counters.processed,
        counters.found,
        scheduler.session.duplicates_canceled()
    );

    if !scheduler.session.is_complete() {
        notice(config.quiet, "Terminated.");
        return None;
    }
    if config.dump_parts {
        match build_inventory(&config.parts_dir()) {
            Ok(inventory) => info!(
                "Inventory: {} reads in {} parts",
                inventory.reads.len(),
                inventory.parts.len()
            ),
            Err(e) => {
                error!("building the inventory failed: {:#}", e);
                return None;
            }
        }
    }
    notice(config.quiet, "Finished.");
    Some(scheduler.tracker.summary(started.elapsed()))
}
