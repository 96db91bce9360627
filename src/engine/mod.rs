//! Engine: worker-side analysis, compute pools, progress display and the CLI.

pub mod analyzer;
pub mod arg_parser;
pub mod batch;
pub mod cli;
pub mod digest;
pub mod hashing;
pub mod pool;
pub mod process_pool;
pub mod progress;
pub mod tools;
pub mod worker;

// Re-export commonly used items
pub use analyzer::{Analyzer, AnalyzerFactory, ScopedAnalyzer};
pub use arg_parser::{Cli, Commands, RunArgs};
pub use batch::{apply_labels, process_batch};
pub use cli::{build_config, handle_cli};
pub use digest::{DigestAnalyzerFactory, classification_dir, part_filename};
pub use hashing::{FileDigest, digest_file};
pub use pool::{Completion, ComputePool, InProcessPool, PoolError};
pub use process_pool::ProcessPool;
pub use progress::{Counters, ProgressDisplay};
pub use tools::{has_suffix, is_hidden_name, path_relative_to, path_to_rel_string};
pub use worker::{WorkerRequest, serve_worker};
