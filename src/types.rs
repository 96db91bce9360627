//! Public and internal types for the porewatch API, the worker protocol and the session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::config::{Defaults, PackagePaths};

/// Monotonic batch identifier, assigned at flush time starting from 0.
pub type BatchId = u64;

/// A group of relative paths dispatched together to one worker invocation.
/// Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    /// Paths relative to the input root, forward-slash separated.
    pub files: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Terminal status of one file within one batch attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Analysis accepted; the filename becomes part of the done set.
    Okay,
    /// File vanished between discovery and analysis.
    Disappeared,
    /// Analyzer-defined terminal status (e.g. `empty`).
    Terminal(String),
}

impl FileStatus {
    pub fn is_okay(&self) -> bool {
        matches!(self, FileStatus::Okay)
    }

    pub fn as_str(&self) -> &str {
        match self {
            FileStatus::Okay => "okay",
            FileStatus::Disappeared => "disappeared",
            FileStatus::Terminal(reason) => reason.as_str(),
        }
    }
}

/// Result for exactly one file of one batch, produced by the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Analyzer-defined fields (sizes, digests, scores...).
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl FileResult {
    pub fn okay(filename: impl Into<String>, read_id: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Okay,
            read_id: Some(read_id.into()),
            label: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn disappeared(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Disappeared,
            read_id: None,
            label: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn terminal(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Terminal(reason.into()),
            read_id: None,
            label: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// What a worker hands back for a whole batch.
///
/// A fault means the worker could not complete the batch at all; it is distinct from a
/// single file's [`FileStatus::Disappeared`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed { results: Vec<FileResult> },
    WorkerFault { message: String, trace: String },
}

/// Session configuration. Built once at startup, passed by reference everywhere and
/// serialized into every worker request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the input tree.
    pub input_dir: PathBuf,
    /// Where writers put their outputs.
    pub output_dir: PathBuf,
    /// Maximum files per batch.
    pub chunk_size: usize,
    /// Number of worker processes.
    pub parallel: usize,
    /// Keep watching the input tree after the initial scan.
    pub live: bool,
    /// Delay before a batch is analyzed (live mode only; forced to zero otherwise).
    pub analysis_start_delay: Duration,
    /// Predict labels once per batch and attach them by read id.
    pub classify: bool,
    /// Suppress non-error console output.
    pub quiet: bool,
    /// Debug logging.
    pub verbose: bool,
    /// Case-insensitive file suffix to ingest.
    pub suffix: String,
    /// Link input files into `raw/<label>/` in the output directory.
    pub link_raw: bool,
    /// Always symlink instead of trying a hard link first.
    pub symlink_raw: bool,
    /// Write per-file records as JSON lines.
    pub records_output: bool,
    /// Dump per-batch parts and build an inventory at the end.
    pub dump_parts: bool,
    /// Worker executable. When None, the current executable is re-invoked in worker mode.
    pub worker_program: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from(Defaults::OUTPUT_DIR),
            chunk_size: Defaults::CHUNK_SIZE,
            parallel: Defaults::PARALLEL,
            live: false,
            analysis_start_delay: Duration::ZERO,
            classify: false,
            quiet: false,
            verbose: false,
            suffix: Defaults::SUFFIX.to_string(),
            link_raw: false,
            symlink_raw: false,
            records_output: true,
            dump_parts: false,
            worker_program: None,
        }
    }
}

impl Config {
    /// Apply cross-field rules: the start delay only exists in live mode, and
    /// symlinking implies linking.
    pub fn normalized(mut self) -> Self {
        if !self.live {
            self.analysis_start_delay = Duration::ZERO;
        }
        if self.symlink_raw {
            self.link_raw = true;
        }
        self
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("batch chunk size must be at least 1");
        }
        if self.parallel == 0 {
            anyhow::bail!("parallel worker count must be at least 1");
        }
        if self.suffix.is_empty() {
            anyhow::bail!("file suffix must not be empty");
        }
        if !self.input_dir.is_dir() {
            anyhow::bail!(
                "Cannot open the input directory {}",
                self.input_dir.display()
            );
        }
        Ok(())
    }

    pub fn parts_dir(&self) -> PathBuf {
        self.output_dir.join(PackagePaths::get().parts_dir_name())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.output_dir.join(PackagePaths::get().raw_dir_name())
    }

    /// Settings block shown at startup and written to the log.
    pub fn describe(&self) -> Vec<String> {
        let yn = |b: bool| if b { "Yes" } else { "No" };
        let input = if self.live {
            format!(
                "{} (live, {} sec delay)",
                self.input_dir.display(),
                self.analysis_start_delay.as_secs()
            )
        } else {
            self.input_dir.display().to_string()
        };
        let link = match (self.link_raw, self.symlink_raw) {
            (true, true) => "Yes (symlink)",
            (true, false) => "Yes",
            _ => "No",
        };
        vec![
            "== Analysis settings ======================================".to_string(),
            format!(" * Input:\t\t{}", input),
            format!(" * Output:\t\t{}", self.output_dir.display()),
            format!(" * Processes:\t\t{}", self.parallel),
            format!(" * Batch size:\t\t{}", self.chunk_size),
            format!(" * Suffix:\t\t{}", self.suffix),
            format!(" * Classify:\t\t{}", yn(self.classify)),
            format!(" * Records in output:\t{}", yn(self.records_output)),
            format!(" * Raw files in output:\t{}", link),
            format!(" * Batch parts dump:\t{}", yn(self.dump_parts)),
            "===========================================================".to_string(),
        ]
    }
}
