//! Content addressing for snapshot identifiers.
//!
//! Identifiers are SHA256 digests of the immutable identity fields:
//!
//! - **Global id**: project url, branch, commit, language and (when present)
//!   category. One buildable/analyzable unit.
//! - **Source id**: project url, branch and commit. Shared by every language
//!   and category of the same commit, so one source archive serves them all.
//!
//! ## Determinism Guarantees
//!
//! - Same ordered parts → same digest, across calls and processes
//! - Parts are joined with a newline; `SnapshotIdentity::new` refuses fields
//!   holding control characters, so distinct tuples never join alike

use sha2::{Digest, Sha256};

/// Separator placed between digest parts
pub const PART_SEPARATOR: &str = "\n";

/// Compute the digest of an ordered sequence of parts.
///
/// ## Example
///
/// ```
/// use cqsnap_core::digest::digest;
///
/// let id = digest(&["https://example.com/repo.git", "main", "abc123"]);
/// assert_eq!(id.len(), 64);
/// assert_eq!(id, digest(&["https://example.com/repo.git", "main", "abc123"]));
/// ```
pub fn digest<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(PART_SEPARATOR);
    hash_string(&joined)
}

/// Hex-encoded SHA256 of a string (64 lowercase characters)
pub fn hash_string(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Hex-encoded SHA256 of raw bytes
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Source id for a project/branch/commit triple
pub fn source_id(project_url: &str, branch: &str, commit: &str) -> String {
    digest(&[project_url, branch, commit])
}

/// Global id for a full identity tuple; the category is only part of the
/// digest when present
pub fn global_id(
    project_url: &str,
    branch: &str,
    commit: &str,
    language: &str,
    category: Option<&str>,
) -> String {
    match category {
        Some(category) => digest(&[project_url, branch, commit, language, category]),
        None => digest(&[project_url, branch, commit, language]),
    }
}
