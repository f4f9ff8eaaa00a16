//! Filesystem object store
//!
//! Buckets are directories under a root; objects are sharded files inside
//! them. Writes are atomic.

use crate::errors::{io_error, storage_error, Result};
use crate::objects::atomic::atomic_copy;
use crate::objects::sharding::{is_valid_key, shard_path};
use crate::objects::ObjectStore;
use cqsnap_core::SnapError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory-backed object store
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, op: &str, bucket: &str) -> Result<PathBuf> {
        if !is_valid_bucket(bucket) {
            return Err(storage_error(op, format!("invalid bucket name '{}'", bucket)));
        }
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(storage_error(op, format!("bucket '{}' does not exist", bucket)));
        }
        Ok(dir)
    }

    fn object_path(&self, op: &str, bucket: &str, key: &str) -> Result<PathBuf> {
        let dir = self.bucket_dir(op, bucket)?;
        if !is_valid_key(key) {
            return Err(storage_error(op, format!("invalid object key '{}'", key)));
        }
        Ok(shard_path(&dir, key))
    }
}

fn is_valid_bucket(bucket: &str) -> bool {
    !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn wrap(op: &str, err: SnapError) -> SnapError {
    storage_error(op, err.message().to_string()).with_source(err)
}

impl ObjectStore for FsObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match fs::metadata(self.root.join(bucket)) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(wrap("bucket_exists", io_error("bucket_exists", e))),
        }
    }

    fn make_bucket(&self, bucket: &str) -> Result<()> {
        if !is_valid_bucket(bucket) {
            return Err(storage_error(
                "make_bucket",
                format!("invalid bucket name '{}'", bucket),
            ));
        }
        fs::create_dir_all(self.root.join(bucket))
            .map_err(|e| wrap("make_bucket", io_error("make_bucket", e)))
    }

    fn stat(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.object_path("stat", bucket, key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(wrap("stat", io_error("stat", e))),
        }
    }

    fn put_file(&self, bucket: &str, key: &str, src: &Path) -> Result<()> {
        let path = self.object_path("put_file", bucket, key)?;
        atomic_copy(src, &path).map_err(|e| wrap("put_file", e))
    }

    fn get_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let path = self.object_path("get_file", bucket, key)?;
        if !path.is_file() {
            return Err(storage_error(
                "get_file",
                format!("object '{}' not found in bucket '{}'", key, bucket),
            ));
        }
        atomic_copy(&path, dest).map_err(|e| wrap("get_file", e))
    }

    fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path("remove", bucket, key)?;
        fs::remove_file(&path).map_err(|e| wrap("remove", io_error("remove", e)))
    }
}
