//! Artifact object storage
//!
//! Provides:
//! - The `ObjectStore` bucket/key seam
//! - A filesystem backend with atomic writes and sharded keys
//! - `ArtifactStore`, the typed gateway over the three artifact namespaces

mod atomic;
mod fs_store;
mod gateway;
mod sharding;

pub use fs_store::FsObjectStore;
pub use gateway::{ArtifactStore, BucketNames, Namespace};

use crate::errors::Result;
use std::path::Path;

/// Bucket-and-key blob storage
///
/// A missing object is reported as `Ok(false)` by [`ObjectStore::stat`] and
/// nowhere else; every other failure is a `Storage` error.
pub trait ObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    fn make_bucket(&self, bucket: &str) -> Result<()>;

    /// Whether `key` exists in `bucket`
    fn stat(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Upload a local file
    fn put_file(&self, bucket: &str, key: &str, src: &Path) -> Result<()>;

    /// Download to a local file, replacing it
    fn get_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;

    fn remove(&self, bucket: &str, key: &str) -> Result<()>;
}
