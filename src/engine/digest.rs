//! Built-in content-digest analyzer used by the CLI workers.
//!
//! Each file gets a blake3 digest and its size. Labels come from the first path component when
//! it names a classification directory (`barcode01`, `bc12`, ...).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::analyzer::{Analyzer, AnalyzerFactory};
use super::hashing::digest_file;
use super::tools::read_id_for;
use crate::{BatchId, Config, FileResult};

pub const UNCLASSIFIED_LABEL: &str = "unclassified";

#[derive(Clone, Copy, Debug, Default)]
pub struct DigestAnalyzerFactory;

impl AnalyzerFactory for DigestAnalyzerFactory {
    fn open(&self, config: &Config, batch_id: BatchId) -> Result<Box<dyn Analyzer>> {
        Ok(Box::new(DigestAnalyzer {
            batch_id,
            parts_dir: config.dump_parts.then(|| config.parts_dir()),
            processed: Vec::new(),
        }))
    }
}

pub struct DigestAnalyzer {
    batch_id: BatchId,
    parts_dir: Option<PathBuf>,
    processed: Vec<FileResult>,
}

impl Analyzer for DigestAnalyzer {
    fn process(&mut self, filename: &str, path: &Path) -> Result<FileResult> {
        let digest = match digest_file(path) {
            Ok(digest) => digest,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(FileResult::disappeared(filename));
            }
            Err(e) => return Err(e).with_context(|| format!("digest {}", path.display())),
        };
        let result = if digest.size == 0 {
            FileResult::terminal(filename, "empty").with_field("size", 0)
        } else {
            FileResult::okay(filename, read_id_for(filename))
                .with_field("size", digest.size)
                .with_field("blake3", digest.hex)
        };
        self.processed.push(result.clone());
        Ok(result)
    }

    fn predict_labels(&mut self) -> Result<HashMap<String, String>> {
        Ok(self
            .processed
            .iter()
            .filter_map(|r| {
                let read_id = r.read_id.clone()?;
                let label = classification_dir(&r.filename).unwrap_or(UNCLASSIFIED_LABEL);
                Some((read_id, label.to_string()))
            })
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        let Some(dir) = &self.parts_dir else {
            return Ok(());
        };
        if self.processed.is_empty() {
            return Ok(());
        }
        let path = dir.join(part_filename(self.batch_id));
        let file = fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut out = BufWriter::new(file);
        for result in &self.processed {
            serde_json::to_writer(&mut out, result)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Name of the part file written for `batch_id`; zero-padded so names sort by batch.
pub fn part_filename(batch_id: BatchId) -> String {
    format!("part-{batch_id:08}.jsonl")
}

/// First path component when it looks like `<letters><digits>`.
pub fn classification_dir(filename: &str) -> Option<&str> {
    let (first, rest) = filename.split_once('/')?;
    if rest.is_empty() {
        return None;
    }
    let digits_at = first.find(|c: char| c.is_ascii_digit())?;
    let (prefix, digits) = first.split_at(digits_at);
    let looks_like_label = !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && digits.chars().all(|c| c.is_ascii_digit());
    looks_like_label.then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_dir_detection() {
        assert_eq!(classification_dir("barcode01/r.fast5"), Some("barcode01"));
        assert_eq!(classification_dir("bc7/sub/r.fast5"), Some("bc7"));
        assert_eq!(classification_dir("r.fast5"), None);
        assert_eq!(classification_dir("reads/r.fast5"), None);
        assert_eq!(classification_dir("01/r.fast5"), None);
        assert_eq!(classification_dir("run1x/r.fast5"), None);
    }

    #[test]
    fn part_names_sort_by_batch() {
        assert_eq!(part_filename(3), "part-00000003.jsonl");
        assert!(part_filename(9) < part_filename(10));
    }
}
