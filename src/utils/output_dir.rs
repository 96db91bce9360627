use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::Config;

/// Remove every entry of `dir` (files and sub-trees), keeping `dir` itself.
pub fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

/// Prepare the output directory: create it when missing, clear it when non-empty and
/// `clear_existing` is set (refuse otherwise), then create sub-directories for enabled outputs.
pub fn prepare_output_dir(config: &Config, clear_existing: bool) -> Result<()> {
    let out = &config.output_dir;
    if out.is_dir() {
        let non_empty = fs::read_dir(out)
            .with_context(|| format!("read output directory {}", out.display()))?
            .next()
            .is_some();
        if non_empty {
            if !clear_existing {
                anyhow::bail!(
                    "Output directory {} is not empty; pass --yes to clear it",
                    out.display()
                );
            }
            log::info!("Clearing output directory {}", out.display());
            clear_dir(out)?;
        }
    } else {
        fs::create_dir_all(out)
            .with_context(|| format!("Failed to create the output directory {}", out.display()))?;
    }

    if config.link_raw {
        fs::create_dir_all(config.raw_dir()).context("create raw output directory")?;
    }
    if config.dump_parts {
        fs::create_dir_all(config.parts_dir()).context("create parts directory")?;
    }
    Ok(())
}
