//! Worker-side batch processing: scoped analyzer, existence re-check, label merge, and
//! conversion of every failure into [`BatchOutcome::WorkerFault`].

use anyhow::Result;
use log::debug;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use super::analyzer::{AnalyzerFactory, ScopedAnalyzer};
use crate::{Batch, BatchOutcome, Config, FileResult};

/// Process one batch. Never panics and never returns an error: faults come back as
/// [`BatchOutcome::WorkerFault`] so they survive the trip across the process boundary.
pub fn process_batch(batch: &Batch, config: &Config, factory: &dyn AnalyzerFactory) -> BatchOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| analyze_batch(batch, config, factory))) {
        Ok(Ok(results)) => BatchOutcome::Completed { results },
        Ok(Err(err)) => BatchOutcome::WorkerFault {
            message: format!("Unhandled error in batch {}: {}", batch.id, err),
            trace: format!("{:?}", err),
        },
        Err(payload) => BatchOutcome::WorkerFault {
            message: format!(
                "Worker panicked in batch {}: {}",
                batch.id,
                panic_message(payload.as_ref())
            ),
            trace: format!("batch {} files: {}", batch.id, batch.files.join(", ")),
        },
    }
}

fn analyze_batch(
    batch: &Batch,
    config: &Config,
    factory: &dyn AnalyzerFactory,
) -> Result<Vec<FileResult>> {
    let mut analyzer = ScopedAnalyzer::open(factory, config, batch.id)?;
    let mut results = Vec::with_capacity(batch.len());
    for filename in &batch.files {
        let path = config.input_dir.join(filename);
        // Files can vanish between discovery and analysis.
        if path.exists() {
            results.push(analyzer.process(filename, &path)?);
        } else {
            debug!("batch {}: {} disappeared", batch.id, filename);
            results.push(FileResult::disappeared(filename.as_str()));
        }
    }

    if config.classify {
        let labels = analyzer.predict_labels()?;
        apply_labels(&mut results, &labels);
    }

    analyzer.finish()?;
    Ok(results)
}

/// Attach predicted labels to results by read id. Results without a read id, or whose id has
/// no prediction, are left untouched.
pub fn apply_labels(results: &mut [FileResult], labels: &HashMap<String, String>) {
    for result in results.iter_mut() {
        if let Some(label) = result.read_id.as_ref().and_then(|id| labels.get(id)) {
            result.label = Some(label.clone());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
