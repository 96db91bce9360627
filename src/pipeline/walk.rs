//! Initial scan of the input tree on a monitor thread.

use anyhow::Result;
use crossbeam_channel::Sender;
use log::{debug, warn};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use walkdir::{DirEntry, WalkDir};

use super::context::{CancelFlag, Origin, SessionEvent};
use crate::engine::tools::{has_suffix, is_hidden_name, path_relative_to, path_to_rel_string};

/// Depth-first walk yielding relative paths of files with the configured suffix.
/// Hidden entries are skipped and hidden directories are not descended into.
pub struct Scanner {
    root: PathBuf,
    suffix: String,
}

/// Files before sub-directories, then by name.
fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    a_dir.cmp(&b_dir).then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().map(is_hidden_name).unwrap_or(false)
}

/// A link whose target is gone; the walk can go on past it.
fn is_dangling_link(err: &walkdir::Error) -> bool {
    let not_found = err
        .io_error()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound);
    not_found
        && err
            .path()
            .and_then(|p| p.symlink_metadata().ok())
            .is_some_and(|m| m.file_type().is_symlink())
}

impl Scanner {
    pub fn new(root: &Path, suffix: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            suffix: suffix.to_string(),
        }
    }

    /// Lazy scan. Symlinked directories are followed. A directory that cannot be read, or a
    /// symlink loop, yields an error.
    pub fn scan(&self) -> impl Iterator<Item = Result<String>> + '_ {
        // min_depth(1) so a hidden root directory is still scanned.
        WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(true)
            .sort_by(files_first)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
            .filter_map(move |r| match r {
                Ok(entry) => self.accept(&entry).map(Ok),
                Err(e) if is_dangling_link(&e) => {
                    let path = e.path().unwrap_or(&self.root);
                    warn!("Skipping dangling symlink {}", path.display());
                    None
                }
                Err(e) => Some(Err(anyhow::anyhow!("scan {}: {}", self.root.display(), e))),
            })
    }

    fn accept(&self, entry: &DirEntry) -> Option<String> {
        if entry.file_type().is_dir() || !entry.path().is_file() {
            return None;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping {}: name is not valid UTF-8", entry.path().display());
            return None;
        };
        if !has_suffix(name, &self.suffix) {
            return None;
        }
        let rel = path_relative_to(entry.path(), &self.root)?;
        let filename = path_to_rel_string(&rel);
        if filename.is_none() {
            warn!("Skipping {}: path is not valid UTF-8", entry.path().display());
        }
        filename
    }
}

/// Run the scan on its own thread. Sends one `Discovered` per file, then `ScanFinished`, or
/// `ScanFailed` on the first unreadable directory.
pub fn spawn_scan_thread(
    scanner: Scanner,
    events: Sender<SessionEvent>,
    cancel: CancelFlag,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("{}-scan", env!("CARGO_PKG_NAME")))
        .spawn(move || {
            let mut count = 0_usize;
            for item in scanner.scan() {
                if cancel.is_canceled() {
                    debug!("scan: canceled after {} files", count);
                    return;
                }
                let event = match item {
                    Ok(filename) => {
                        count += 1;
                        SessionEvent::Discovered {
                            filename,
                            origin: Origin::Scan,
                        }
                    }
                    Err(e) => {
                        let _ = events.send(SessionEvent::ScanFailed(format!("{:#}", e)));
                        return;
                    }
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            debug!("scan: {} files", count);
            let _ = events.send(SessionEvent::ScanFinished);
        })?;
    Ok(handle)
}
