//! Checksum validation for migrations
//!
//! Detects edits to a migration after it was applied

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of migration SQL
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
