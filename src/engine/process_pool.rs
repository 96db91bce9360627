//! Out-of-process worker pool: one child process per slot, driven over stdin/stdout.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::pool::{Completion, ComputePool, PoolError};
use super::worker::encode_request;
use crate::utils::config::{PackagePaths, WORKER_VERBOSE_ENV};
use crate::{Batch, BatchOutcome, Config};

struct Job {
    batch: Batch,
    config: Arc<Config>,
    done: Completion,
}

/// Live child processes by slot, so they can be killed from any thread.
type ChildRegistry = Arc<Mutex<HashMap<usize, Child>>>;

/// Fixed-size pool of worker processes (`<program> worker`).
///
/// Each slot thread owns the pipes of one child and feeds it one batch at a time. The
/// [`Child`] handles live in a shared registry so [`ComputePool::terminate_all`] can kill every
/// worker while slot threads are blocked on a read.
pub struct ProcessPool {
    job_tx: Option<Sender<Job>>,
    slots: Vec<JoinHandle<()>>,
    children: ChildRegistry,
    terminated: Arc<AtomicBool>,
}

impl ProcessPool {
    /// Spawn `size` workers running `program worker`.
    pub fn spawn(program: &Path, size: usize) -> Result<Self> {
        Self::start(program, size, false)
    }

    fn start(program: &Path, size: usize, verbose: bool) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let children: ChildRegistry = Arc::new(Mutex::new(HashMap::new()));
        let terminated = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            job_tx: Some(job_tx),
            slots: Vec::with_capacity(size),
            children,
            terminated,
        };

        for slot in 0..size.max(1) {
            let mut child = spawn_worker(program, verbose)
                .with_context(|| format!("spawn worker {} ({})", slot, program.display()))?;
            let stdin = child.stdin.take().context("worker stdin not piped")?;
            let stdout = child.stdout.take().context("worker stdout not piped")?;
            debug!("worker slot {}: pid {}", slot, child.id());
            if let Ok(mut registry) = pool.children.lock() {
                registry.insert(slot, child);
            }

            let job_rx = job_rx.clone();
            let terminated = Arc::clone(&pool.terminated);
            let handle = thread::Builder::new()
                .name(format!("{}-slot-{}", env!("CARGO_PKG_NAME"), slot))
                .spawn(move || slot_loop(slot, job_rx, stdin, BufReader::new(stdout), terminated))
                .context("spawn worker slot thread")?;
            pool.slots.push(handle);
        }
        Ok(pool)
    }

    /// Spawn workers from the configured program, or re-invoke the current executable.
    pub fn from_config(config: &Config) -> Result<Self> {
        let program = match &config.worker_program {
            Some(p) => p.clone(),
            None => std::env::current_exe().context("locate current executable")?,
        };
        Self::start(&program, config.parallel, config.verbose)
    }

    /// Number of worker processes still registered.
    pub fn live_workers(&self) -> usize {
        self.children.lock().map(|c| c.len()).unwrap_or(0)
    }
}

fn spawn_worker(program: &Path, verbose: bool) -> std::io::Result<Child> {
    let mut cmd = Command::new(PathBuf::from(program));
    cmd.arg(PackagePaths::get().worker_subcommand())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    if verbose {
        cmd.env(WORKER_VERBOSE_ENV, "1");
    }
    // Own process group: a terminal Ctrl-C reaches the orchestrator only, which then kills
    // the workers itself.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn()
}

fn slot_loop(
    slot: usize,
    job_rx: Receiver<Job>,
    mut stdin: ChildStdin,
    mut stdout: BufReader<ChildStdout>,
    terminated: Arc<AtomicBool>,
) {
    while let Ok(job) = job_rx.recv() {
        if terminated.load(Ordering::Relaxed) {
            (job.done)(Err(PoolError::Terminated));
            continue;
        }
        let outcome = exchange(&mut stdin, &mut stdout, &job.batch, &job.config);
        if let Err(ref e) = outcome {
            debug!("worker slot {}: batch {}: {}", slot, job.batch.id, e);
        }
        let outcome = if terminated.load(Ordering::Relaxed) {
            Err(PoolError::Terminated)
        } else {
            outcome
        };
        (job.done)(outcome);
    }
    debug!("worker slot {}: job channel closed", slot);
}

/// Send one request and read one answer line.
fn exchange(
    stdin: &mut ChildStdin,
    stdout: &mut BufReader<ChildStdout>,
    batch: &Batch,
    config: &Config,
) -> Result<BatchOutcome, PoolError> {
    let broken = |e: &dyn std::fmt::Display| PoolError::Broken(e.to_string());
    let request = encode_request(batch, config).map_err(|e| broken(&e))?;
    stdin
        .write_all(request.as_bytes())
        .and_then(|_| stdin.write_all(b"\n"))
        .and_then(|_| stdin.flush())
        .map_err(|e| broken(&e))?;

    let mut line = String::new();
    match stdout.read_line(&mut line) {
        Ok(0) => Err(PoolError::Broken("worker exited".to_string())),
        Ok(_) => serde_json::from_str(&line).map_err(|e| broken(&e)),
        Err(e) => Err(broken(&e)),
    }
}

impl ComputePool for ProcessPool {
    fn submit(&self, batch: Batch, config: Arc<Config>, done: Completion) {
        let job = Job {
            batch,
            config,
            done,
        };
        match &self.job_tx {
            Some(tx) => {
                if let Err(send_err) = tx.send(job) {
                    (send_err.0.done)(Err(PoolError::Broken("pool is shut down".to_string())));
                }
            }
            None => (job.done)(Err(PoolError::Broken("pool is shut down".to_string()))),
        }
    }

    fn terminate_all(&self) {
        self.terminated.store(true, Ordering::Relaxed);
        if let Ok(mut registry) = self.children.lock() {
            for (slot, child) in registry.iter_mut() {
                if let Ok(None) = child.try_wait() {
                    debug!("killing worker slot {} (pid {})", slot, child.id());
                    if let Err(e) = child.kill() {
                        warn!("kill worker slot {}: {}", slot, e);
                    }
                }
            }
        }
    }
}

impl Drop for ProcessPool {
    fn drop(&mut self) {
        // Closing the job channel lets idle slots exit; killing the children unblocks busy ones.
        self.job_tx.take();
        self.terminate_all();
        if let Ok(mut registry) = self.children.lock() {
            for (_, mut child) in registry.drain() {
                let _ = child.wait();
            }
        }
        for handle in self.slots.drain(..) {
            let _ = handle.join();
        }
    }
}
