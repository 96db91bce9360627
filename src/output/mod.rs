//! Writer collaborators fed with merged results, the final summary tracker and the
//! end-of-run inventory.

pub mod inventory;
pub mod links;
pub mod records;
pub mod summary_table;
pub mod tracker;

use anyhow::Result;
use std::sync::Arc;

use crate::{Config, FileResult};

pub use inventory::build_inventory;
pub use links::RawFileLinker;
pub use records::RecordsWriter;
pub use summary_table::SummaryTableWriter;
pub use tracker::{FinalSummary, FinalSummaryTracker};

/// Persists merged results. Calls run on the I/O pool, so one writer can receive batches from
/// several threads; implementations serialize their own output.
pub trait ResultWriter: Send + Sync {
    fn name(&self) -> &str;

    fn write_results(&self, results: &[FileResult]) -> Result<()>;

    /// Flush and release. Called once after the last batch was written.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Open every writer enabled by `config`. The summary table is always written.
pub fn open_writers(config: &Config) -> Result<Vec<Arc<dyn ResultWriter>>> {
    let mut writers: Vec<Arc<dyn ResultWriter>> = Vec::new();
    if config.records_output {
        writers.push(Arc::new(RecordsWriter::create(config)?));
    }
    if config.link_raw {
        writers.push(Arc::new(RawFileLinker::new(config)));
    }
    writers.push(Arc::new(SummaryTableWriter::create(config)?));
    Ok(writers)
}
