//! End-of-run consolidation of per-batch part files.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::FileResult;
use crate::utils::config::PackagePaths;

/// Contents of `inventory.json`: part files in batch order and the part holding each read.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    pub parts: Vec<String>,
    pub reads: BTreeMap<String, String>,
}

/// Read every `part-*.jsonl` in `parts_dir` and write the inventory next to them.
pub fn build_inventory(parts_dir: &Path) -> Result<Inventory> {
    let mut parts: Vec<String> = fs::read_dir(parts_dir)
        .with_context(|| format!("read {}", parts_dir.display()))?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with("part-") && name.ends_with(".jsonl"))
        .collect();
    parts.sort();

    let mut inventory = Inventory::default();
    for part in &parts {
        let path = parts_dir.join(part);
        let file = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FileResult>(&line) {
                Ok(result) => {
                    if let Some(read_id) = result.read_id {
                        inventory.reads.insert(read_id, part.clone());
                    }
                }
                Err(e) => warn!("{}: skipping malformed line: {}", path.display(), e),
            }
        }
    }
    inventory.parts = parts;

    let out = parts_dir.join(PackagePaths::get().inventory_filename());
    let json = serde_json::to_string_pretty(&inventory)?;
    fs::write(&out, json).with_context(|| format!("write {}", out.display()))?;
    debug!(
        "inventory: {} parts, {} reads",
        inventory.parts.len(),
        inventory.reads.len()
    );
    Ok(inventory)
}
