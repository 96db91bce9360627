//! Porewatch: batch orchestrator for growing directory trees.
//!
//! A session scans an input directory (and, in live mode, keeps watching it), groups matching
//! files into batches, analyzes them on a pool of worker processes and hands every file's
//! result to the writers exactly once.
//!
//! ```ignore
//! let config = porewatch::Config { input_dir: "reads".into(), ..Default::default() };
//! let collaborators = porewatch::Collaborators::standard(&config)?;
//! if let Some(summary) = porewatch::run(&config, collaborators) {
//!     summary.print_to(&mut std::io::stdout())?;
//! }
//! ```

pub mod engine;
pub mod output;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use output::{FinalSummary, ResultWriter};
pub use pipeline::{Collaborators, run};

/// Result alias used by public porewatch API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
