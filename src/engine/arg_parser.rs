use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Batch orchestrator for growing directory trees.
#[derive(Clone, Parser)]
#[command(name = "porewatch", version)]
#[command(about = "Scan (and optionally watch) a directory, analyze files in batches on worker processes, merge results exactly once.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Process an input directory.
    Run(RunArgs),
    /// Serve batches over stdin/stdout (spawned by `run`; not meant for direct use).
    #[command(hide = true)]
    Worker,
}

#[derive(Clone, Args)]
pub struct RunArgs {
    /// Directory with the input files.
    #[arg(long, short, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Output directory.
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Number of worker processes (default: 1).
    #[arg(long, short, value_name = "COUNT")]
    pub parallel: Option<usize>,

    /// Number of files in a single batch (default: 128).
    #[arg(long, value_name = "SIZE")]
    pub batch_chunk: Option<usize>,

    /// Settings file. Default: `porewatch.toml` in the working directory, when present.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep watching the input directory for new files after the initial scan.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub live: Option<bool>,

    /// Seconds to delay the start of analysis in live mode (default: 60).
    #[arg(long, value_name = "SECONDS")]
    pub live_analysis_delay: Option<u64>,

    /// Predict labels per batch and sort outputs by label.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub classify: Option<bool>,

    /// Case-insensitive suffix of input files (default: .fast5).
    #[arg(long, value_name = "SUFFIX")]
    pub suffix: Option<String>,

    /// Link or copy input files into per-label output directories.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub link_raw: Option<bool>,

    /// Always create symbolic links for input files, even when hard linking is possible.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub symlink_raw: Option<bool>,

    /// Do not write per-file JSON records.
    #[arg(long)]
    pub no_records: bool,

    /// Dump per-batch result parts and build an inventory at the end.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub dump_parts: Option<bool>,

    /// Suppress non-error messages.
    #[arg(long, short = 'q', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub quiet: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Clear a non-empty output directory without asking.
    #[arg(long, short = 'y')]
    pub yes: bool,
}
