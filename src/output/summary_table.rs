use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::ResultWriter;
use crate::utils::config::PackagePaths;
use crate::{Config, FileResult};

const HEADER: &str = "filename\tread_id\tstatus\tlabel\tsize";

/// Tab-separated run summary, one row per result.
pub struct SummaryTableWriter {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
}

impl SummaryTableWriter {
    pub fn create(config: &Config) -> Result<Self> {
        Self::create_at(&config.output_dir.join(PackagePaths::get().summary_filename()))
    }

    pub fn create_at(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", HEADER)?;
        Ok(Self {
            path: path.to_path_buf(),
            out: Mutex::new(out),
        })
    }
}

/// Row for one result; missing values are written as `-`.
pub fn summary_row(result: &FileResult) -> String {
    let size = result
        .fields
        .get("size")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\t{}\t{}\t{}\t{}",
        result.filename,
        result.read_id.as_deref().unwrap_or("-"),
        result.status.as_str(),
        result.label.as_deref().unwrap_or("-"),
        size
    )
}

impl ResultWriter for SummaryTableWriter {
    fn name(&self) -> &str {
        "summary"
    }

    fn write_results(&self, results: &[FileResult]) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("summary writer lock poisoned"))?;
        for result in results {
            writeln!(out, "{}", summary_row(result))?;
        }
        out.flush()
            .with_context(|| format!("write {}", self.path.display()))
    }

    fn close(&self) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("summary writer lock poisoned"))?;
        out.flush()
            .with_context(|| format!("flush {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_uses_placeholders() {
        let okay = FileResult::okay("a/r1.fast5", "r1").with_field("size", 12);
        assert_eq!(summary_row(&okay), "a/r1.fast5\tr1\tokay\t-\t12");
        let gone = FileResult::disappeared("r2.fast5");
        assert_eq!(summary_row(&gone), "r2.fast5\t-\tdisappeared\t-\t-");
    }
}
