//! Per-batch analyzer contract and the scope guard that guarantees `close`.

use anyhow::Result;
use log::warn;
use std::collections::HashMap;
use std::path::Path;

use crate::{BatchId, Config, FileResult};

/// Analysis context opened once per batch.
///
/// `process` is called for every file that still exists, `predict_labels` at most once after
/// all files when classification is enabled, and `close` exactly once at batch end (also when
/// processing fails part-way; see [`ScopedAnalyzer`]).
pub trait Analyzer {
    /// Analyze one file. `filename` is relative to the input root, `path` is absolute.
    fn process(&mut self, filename: &str, path: &Path) -> Result<FileResult>;

    /// Labels for the reads processed so far, keyed by read id.
    fn predict_labels(&mut self) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens analyzers. Shared across worker threads, hence `Send + Sync`.
pub trait AnalyzerFactory: Send + Sync {
    fn open(&self, config: &Config, batch_id: BatchId) -> Result<Box<dyn Analyzer>>;
}

/// Owns an open analyzer for the duration of one batch and closes it on drop.
///
/// [`ScopedAnalyzer::finish`] closes it explicitly so a close error can be reported; when the
/// batch bails out early (error or panic) the guard closes it and only logs a close failure.
pub struct ScopedAnalyzer {
    inner: Option<Box<dyn Analyzer>>,
    batch_id: BatchId,
}

impl ScopedAnalyzer {
    pub fn open(factory: &dyn AnalyzerFactory, config: &Config, batch_id: BatchId) -> Result<Self> {
        let inner = factory.open(config, batch_id)?;
        Ok(Self {
            inner: Some(inner),
            batch_id,
        })
    }

    pub fn process(&mut self, filename: &str, path: &Path) -> Result<FileResult> {
        self.analyzer()?.process(filename, path)
    }

    pub fn predict_labels(&mut self) -> Result<HashMap<String, String>> {
        self.analyzer()?.predict_labels()
    }

    /// Close now and surface the close error.
    pub fn finish(mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut analyzer) => analyzer.close(),
            None => Ok(()),
        }
    }

    fn analyzer(&mut self) -> Result<&mut Box<dyn Analyzer>> {
        self.inner
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("analyzer for batch {} already closed", self.batch_id))
    }
}

impl Drop for ScopedAnalyzer {
    fn drop(&mut self) {
        if let Some(mut analyzer) = self.inner.take()
            && let Err(e) = analyzer.close()
        {
            warn!("closing analyzer for batch {}: {:#}", self.batch_id, e);
        }
    }
}
