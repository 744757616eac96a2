//! Content fingerprints for install reuse
//!
//! A fingerprint is the SHA256 hex digest of everything that affects the
//! installed tree: the lockfile bytes and the effective `.npmrc` bytes.
//! Each input is length-prefixed so that moving bytes between the two
//! inputs changes the digest, and an absent config hashes differently from
//! an empty one.

use crate::error::{NodeLayerError, NodeLayerResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

const CONFIG_ABSENT: u8 = 0;
const CONFIG_PRESENT: u8 = 1;

/// Compute the fingerprint of a lockfile and an optional config file
pub fn fingerprint(lockfile: &[u8], config: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update((lockfile.len() as u64).to_le_bytes());
    hasher.update(lockfile);

    match config {
        Some(bytes) => {
            hasher.update([CONFIG_PRESENT]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        None => hasher.update([CONFIG_ABSENT]),
    }

    hex::encode(hasher.finalize())
}

/// Read inputs from disk and fingerprint them
///
/// A missing config file counts as absent. A missing lockfile is an error.
pub fn fingerprint_files(lockfile: &Path, config: Option<&Path>) -> NodeLayerResult<String> {
    let lock_bytes = fs::read(lockfile)
        .map_err(|e| NodeLayerError::io(format!("reading {}", lockfile.display()), e))?;

    let config_bytes = match config {
        Some(path) => match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(NodeLayerError::io(
                    format!("reading {}", path.display()),
                    e,
                ))
            }
        },
        None => None,
    };

    Ok(fingerprint(&lock_bytes, config_bytes.as_deref()))
}
