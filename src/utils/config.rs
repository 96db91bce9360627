//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
    records_filename: String,
    summary_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache paths from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!("{pkg}.toml"),
                records_filename: "records.jsonl".to_string(),
                summary_filename: "summary.tsv".to_string(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Optional settings file looked up in the working directory.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    pub fn records_filename(&self) -> &str {
        &self.records_filename
    }

    pub fn summary_filename(&self) -> &str {
        &self.summary_filename
    }

    pub fn parts_dir_name(&self) -> &str {
        "parts"
    }

    pub fn raw_dir_name(&self) -> &str {
        "raw"
    }

    pub fn inventory_filename(&self) -> &str {
        "inventory.json"
    }

    /// Argument that switches the executable into worker mode.
    pub fn worker_subcommand(&self) -> &str {
        "worker"
    }
}

// ---- Defaults ----

/// Defaults applied before the settings file and CLI flags.
pub struct Defaults;

impl Defaults {
    pub const CHUNK_SIZE: usize = 128;
    pub const PARALLEL: usize = 1;
    pub const SUFFIX: &'static str = ".fast5";
    pub const OUTPUT_DIR: &'static str = "porewatch-out";
    /// Start delay in live mode, letting just-written files settle (seconds).
    pub const LIVE_ANALYSIS_DELAY_SECS: u64 = 60;
}

// ---- Scheduler ----

/// Heartbeat and watchdog tuning for the scheduler loop.
pub struct HeartbeatConsts;

impl HeartbeatConsts {
    /// Progress refresh and watchdog period.
    pub const HEARTBEAT: Duration = Duration::from_millis(300);
    /// Lower bound on the forced-flush interval, so sparse arrivals are not flushed too eagerly.
    pub const FORCED_FLUSH_FLOOR: Duration = Duration::from_secs(10);
    /// How long the watch thread blocks before re-checking cancellation.
    pub const WATCH_POLL: Duration = Duration::from_millis(300);
}

/// Number of heartbeats `reads_queued` may stay positive before the live watchdog forces a flush.
pub fn forced_flush_heartbeats(start_delay: Duration) -> u64 {
    let heartbeat = HeartbeatConsts::HEARTBEAT.as_millis();
    let derived = start_delay.as_millis().div_ceil(heartbeat);
    let floor = HeartbeatConsts::FORCED_FLUSH_FLOOR.as_millis() / heartbeat;
    derived.max(floor) as u64
}

// ---- Pools ----

/// Set on worker processes spawned by a verbose session.
pub const WORKER_VERBOSE_ENV: &str = "POREWATCH_WORKER_VERBOSE";

/// Threads in the blocking I/O pool running writer calls.
pub const IO_POOL_SIZE: usize = 2;

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}
