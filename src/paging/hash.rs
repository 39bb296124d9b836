//! Content identity helpers
//!
//! Books identify their bytes with SHA-256 truncated to `HASH_LEN` bytes.
//! Only the width and the "same bytes, same digest" guarantee matter to
//! the cache; documents may supply their own digest instead.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::types::{ContentHash, HASH_LEN};

const READ_BUF_LEN: usize = 64 * 1024;

/// Digest of an in-memory buffer
pub fn compute_hash(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    truncate(hasher)
}

/// Digest of everything a reader yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_LEN];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(truncate(hasher))
}

/// Digest of a file on disk
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
    hash_reader(File::open(path)?)
}

fn truncate(hasher: Sha256) -> ContentHash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; HASH_LEN];
    bytes.copy_from_slice(&digest[..HASH_LEN]);
    ContentHash::from_bytes(bytes)
}
