//! Compute pool contract and the in-process (thread) implementation.

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::analyzer::AnalyzerFactory;
use super::batch::process_batch;
use crate::{Batch, BatchOutcome, Config};

/// Why a submission produced no [`BatchOutcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The worker died or the transport to it failed.
    Broken(String),
    /// The pool was terminated before or while the batch ran.
    Terminated,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Broken(msg) => write!(f, "worker pool broken: {}", msg),
            PoolError::Terminated => write!(f, "worker pool terminated"),
        }
    }
}

/// Called exactly once per submission, from a pool thread.
pub type Completion = Box<dyn FnOnce(Result<BatchOutcome, PoolError>) + Send + 'static>;

/// CPU-bound worker pool: submit without blocking, kill everything on shutdown.
pub trait ComputePool: Send {
    /// Queue `batch`. `done` receives the outcome once the batch settles.
    fn submit(&self, batch: Batch, config: Arc<Config>, done: Completion);

    /// Stop all workers immediately. Workers cannot be asked to yield, so in-flight
    /// submissions settle with an error (or their result is discarded).
    fn terminate_all(&self);
}

/// Thread-backed pool running [`process_batch`] on a rayon pool.
///
/// Threads cannot be killed: `terminate_all` discards in-flight results and fails queued
/// submissions, but an analysis already running finishes on its thread. Use
/// [`ProcessPool`](super::process_pool::ProcessPool) when workers must be killable.
pub struct InProcessPool {
    pool: rayon::ThreadPool,
    factory: Arc<dyn AnalyzerFactory>,
    terminated: Arc<AtomicBool>,
}

impl InProcessPool {
    pub fn new(num_threads: usize, factory: Arc<dyn AnalyzerFactory>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("{}-compute-{}", env!("CARGO_PKG_NAME"), i))
            .build()
            .context("build compute thread pool")?;
        Ok(Self {
            pool,
            factory,
            terminated: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl ComputePool for InProcessPool {
    fn submit(&self, batch: Batch, config: Arc<Config>, done: Completion) {
        let factory = Arc::clone(&self.factory);
        let terminated = Arc::clone(&self.terminated);
        self.pool.spawn(move || {
            if terminated.load(Ordering::Relaxed) {
                done(Err(PoolError::Terminated));
                return;
            }
            let outcome = process_batch(&batch, &config, factory.as_ref());
            if terminated.load(Ordering::Relaxed) {
                done(Err(PoolError::Terminated));
            } else {
                done(Ok(outcome));
            }
        });
    }

    fn terminate_all(&self) {
        self.terminated.store(true, Ordering::Relaxed);
    }
}
