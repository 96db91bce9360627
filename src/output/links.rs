//! Links (or copies) input files into `raw/<bucket>/` in the output directory.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::ResultWriter;
use crate::{Config, FileResult, FileStatus};

/// Bucket for a result: its label when classified, else `pass`/`fail` by status.
pub fn link_bucket(result: &FileResult) -> &str {
    match (&result.label, &result.status) {
        (Some(label), _) => label.as_str(),
        (None, FileStatus::Okay) => "pass",
        (None, _) => "fail",
    }
}

pub struct RawFileLinker {
    input_dir: PathBuf,
    raw_dir: PathBuf,
    force_symlink: bool,
}

impl RawFileLinker {
    pub fn new(config: &Config) -> Self {
        Self {
            input_dir: config.input_dir.clone(),
            raw_dir: config.raw_dir(),
            force_symlink: config.symlink_raw,
        }
    }

    fn link_one(&self, result: &FileResult) -> Result<()> {
        let source = self.input_dir.join(&result.filename);
        let Some(name) = source.file_name() else {
            return Ok(());
        };
        let dir = self.raw_dir.join(link_bucket(result));
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let dest = dir.join(name);
        if dest.symlink_metadata().is_ok() {
            if same_file(&source, &dest) {
                debug!("{} already linked", dest.display());
            } else {
                warn!(
                    "Not linking {}: {} already holds a different file of the same name",
                    source.display(),
                    dest.display()
                );
            }
            return Ok(());
        }

        if !self.force_symlink {
            match fs::hard_link(&source, &dest) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("{} disappeared before linking", source.display());
                    return Ok(());
                }
                Err(e) => debug!("hard link {} failed ({}), falling back", source.display(), e),
            }
        }
        soft_link_or_copy(&source, &dest)
    }
}

/// Both paths resolve to the same inode.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

/// Copies carry no identity; compare canonical paths only.
#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    matches!((a.canonicalize(), b.canonicalize()), (Ok(a), Ok(b)) if a == b)
}

#[cfg(unix)]
fn soft_link_or_copy(source: &Path, dest: &Path) -> Result<()> {
    let target = source
        .canonicalize()
        .with_context(|| format!("resolve {}", source.display()))?;
    std::os::unix::fs::symlink(&target, dest)
        .with_context(|| format!("symlink {} -> {}", dest.display(), target.display()))
}

#[cfg(not(unix))]
fn soft_link_or_copy(source: &Path, dest: &Path) -> Result<()> {
    fs::copy(source, dest)
        .map(|_| ())
        .with_context(|| format!("copy {} -> {}", source.display(), dest.display()))
}

impl ResultWriter for RawFileLinker {
    fn name(&self) -> &str {
        "raw links"
    }

    fn write_results(&self, results: &[FileResult]) -> Result<()> {
        for result in results {
            if matches!(result.status, FileStatus::Disappeared) {
                continue;
            }
            self.link_one(result)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets() {
        let mut okay = FileResult::okay("r1.fast5", "r1");
        assert_eq!(link_bucket(&okay), "pass");
        okay.label = Some("barcode02".to_string());
        assert_eq!(link_bucket(&okay), "barcode02");
        assert_eq!(link_bucket(&FileResult::terminal("r2.fast5", "empty")), "fail");
    }

    #[cfg(unix)]
    #[test]
    fn same_name_in_another_directory_keeps_first_link() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        fs::create_dir_all(input.join("a")).unwrap();
        fs::create_dir_all(input.join("b")).unwrap();
        fs::write(input.join("a/r1.fast5"), "first").unwrap();
        fs::write(input.join("b/r1.fast5"), "second").unwrap();
        let config = Config {
            input_dir: input.clone(),
            output_dir: tmp.path().join("out"),
            link_raw: true,
            ..Default::default()
        };
        let linker = RawFileLinker::new(&config);
        let first = FileResult::okay("a/r1.fast5", "r1");
        linker.write_results(std::slice::from_ref(&first)).unwrap();
        linker
            .write_results(&[FileResult::okay("b/r1.fast5", "r1")])
            .unwrap();

        let dest = config.raw_dir().join("pass/r1.fast5");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "first");
        assert!(same_file(&input.join("a/r1.fast5"), &dest));
        assert!(!same_file(&input.join("b/r1.fast5"), &dest));
        // Re-linking the same source is a quiet no-op.
        linker.write_results(&[first]).unwrap();
    }
}
