//! Checksums for migration history rows
//!
//! A history row carries the SHA256 of the plan that produced it, so two
//! stores migrated by the same plan record the same checksum.

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}
