use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::ResultWriter;
use crate::utils::config::PackagePaths;
use crate::{Config, FileResult};

/// One JSON object per result in `records.jsonl`.
pub struct RecordsWriter {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

impl RecordsWriter {
    pub fn create(config: &Config) -> Result<Self> {
        Self::create_at(&config.output_dir.join(PackagePaths::get().records_filename()))
    }

    pub fn create_at(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl ResultWriter for RecordsWriter {
    fn name(&self) -> &str {
        "records"
    }

    fn write_results(&self, results: &[FileResult]) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("records writer lock poisoned"))?;
        for result in results {
            serde_json::to_writer(&mut *out, result)?;
            out.write_all(b"\n")?;
        }
        // Keep the file readable while a live session is still running.
        out.flush()
            .with_context(|| format!("write {}", self.path.display()))
    }

    fn close(&self) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("records writer lock poisoned"))?;
        out.flush()
            .with_context(|| format!("flush {}", self.path.display()))
    }
}
