//! Content digests for input files.

use blake3::Hasher;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::utils::config::HashingConsts;

/// Size and blake3 digest of one file, read in a single open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    pub hex: String,
}

/// Digest `path`. Large files are memory-mapped, smaller ones streamed in fixed chunks.
/// Returns the raw I/O error so callers can tell a vanished file apart.
pub fn digest_file(path: &Path) -> io::Result<FileDigest> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut hasher = Hasher::new();
    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        // SAFETY: input files are complete once discovered; a concurrent truncation is the
        // producer's bug and only affects this file's digest.
        let map = unsafe { Mmap::map(&file)? };
        hasher.update(&map);
    } else if size > 0 {
        let reader = BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        hasher.update_reader(reader)?;
    }
    Ok(FileDigest {
        size,
        hex: hasher.finalize().to_hex().to_string(),
    })
}
