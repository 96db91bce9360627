//! Path and filter utilities

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Normalize a relative path to the string form used in batches and the done set: its
/// components joined with `/`. A backslash inside a Unix file name is kept as is.
/// `None` when a component is not valid UTF-8.
pub fn path_to_rel_string(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Entries whose name starts with a dot are never ingested, nor descended into.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Case-insensitive suffix match.
pub fn has_suffix(name: &str, suffix: &str) -> bool {
    name.to_lowercase().ends_with(&suffix.to_lowercase())
}

/// Canonicalize the input root so scan and watch agree on relative paths.
pub fn canonical_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("canonicalize input directory {}", path.display()))
}

/// Read id derived from a relative filename: the file stem.
pub fn read_id_for(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_match_ignores_case() {
        assert!(has_suffix("read_1.FAST5", ".fast5"));
        assert!(has_suffix("read_1.fast5", ".FAST5"));
        assert!(!has_suffix("read_1.fast5.tmp", ".fast5"));
    }

    #[test]
    fn hidden_names() {
        assert!(is_hidden_name(".partial.fast5"));
        assert!(!is_hidden_name("reads"));
    }

    #[test]
    fn rel_string_joins_components_with_slash() {
        assert_eq!(
            path_to_rel_string(Path::new("bc01/a.fast5")).as_deref(),
            Some("bc01/a.fast5")
        );
        assert_eq!(path_to_rel_string(Path::new("./a.fast5")).as_deref(), Some("a.fast5"));
        assert_eq!(path_to_rel_string(Path::new("../a.fast5")), None);
    }

    #[cfg(unix)]
    #[test]
    fn rel_string_keeps_backslash_in_unix_names() {
        assert_eq!(
            path_to_rel_string(Path::new("x/a\\b.fast5")).as_deref(),
            Some("x/a\\b.fast5")
        );
    }

    #[cfg(unix)]
    #[test]
    fn rel_string_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        let name = OsStr::from_bytes(b"r\xff.fast5");
        assert_eq!(path_to_rel_string(Path::new(name)), None);
    }

    #[test]
    fn read_id_is_stem() {
        assert_eq!(read_id_for("barcode01/read_7.fast5"), "read_7");
    }
}
