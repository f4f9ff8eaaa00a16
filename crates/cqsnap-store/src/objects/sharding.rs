//! Key sharding
//!
//! Objects are spread over subdirectories named by the first 2 characters
//! of their key, keeping directory sizes bounded.

use std::path::{Path, PathBuf};

/// For key "abc123...", returns "<bucket_dir>/ab/abc123..."
pub fn shard_path(bucket_dir: &Path, key: &str) -> PathBuf {
    let shard = &key[..2.min(key.len())];
    bucket_dir.join(shard).join(key)
}

/// Keys are hex digests; anything that could escape the bucket is refused
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_path() {
        let path = shard_path(Path::new("/store/sources"), "abc123def456");
        assert_eq!(path, PathBuf::from("/store/sources/ab/abc123def456"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        assert!(is_valid_key(&"f".repeat(64)));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("../etc"));
        assert!(!is_valid_key("ab/cd"));
    }
}
