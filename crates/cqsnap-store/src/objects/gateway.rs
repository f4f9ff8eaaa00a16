//! Typed gateway over the artifact namespaces
//!
//! | Namespace | Key         | Content                     |
//! |-----------|-------------|-----------------------------|
//! | Source    | `source_id` | archived source tree        |
//! | Database  | `global_id` | database bundle             |
//! | Sarif     | `global_id` | analysis results            |

use crate::errors::Result;
use crate::objects::ObjectStore;
use std::fmt;
use std::path::Path;

/// Artifact namespace, one bucket each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Source,
    Database,
    Sarif,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Source, Namespace::Database, Namespace::Sarif];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Source => "source",
            Namespace::Database => "database",
            Namespace::Sarif => "sarif",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket name per namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
    pub source: String,
    pub database: String,
    pub sarif: String,
}

impl Default for BucketNames {
    fn default() -> Self {
        Self {
            source: "sources".to_string(),
            database: "databases".to_string(),
            sarif: "sarifs".to_string(),
        }
    }
}

impl BucketNames {
    pub fn for_namespace(&self, namespace: Namespace) -> &str {
        match namespace {
            Namespace::Source => &self.source,
            Namespace::Database => &self.database,
            Namespace::Sarif => &self.sarif,
        }
    }
}

/// Artifact store gateway
///
/// No caching: every call reaches the backend.
pub struct ArtifactStore {
    backend: Box<dyn ObjectStore>,
    buckets: BucketNames,
}

impl ArtifactStore {
    pub fn new(backend: Box<dyn ObjectStore>, buckets: BucketNames) -> Self {
        Self { backend, buckets }
    }

    pub fn buckets(&self) -> &BucketNames {
        &self.buckets
    }

    /// `false` for a missing key; transport failures are errors
    pub fn exists(&self, namespace: Namespace, key: &str) -> Result<bool> {
        self.backend
            .stat(self.buckets.for_namespace(namespace), key)
    }

    pub fn put(&self, namespace: Namespace, key: &str, local_path: &Path) -> Result<()> {
        self.backend
            .put_file(self.buckets.for_namespace(namespace), key, local_path)?;
        tracing::debug!(namespace = %namespace, key, "Stored artifact");
        Ok(())
    }

    /// Fails with a `Storage` error when the key is absent
    pub fn get(&self, namespace: Namespace, key: &str, dest_path: &Path) -> Result<()> {
        self.backend
            .get_file(self.buckets.for_namespace(namespace), key, dest_path)
    }

    /// Callers check [`ArtifactStore::exists`] first
    pub fn remove(&self, namespace: Namespace, key: &str) -> Result<()> {
        self.backend
            .remove(self.buckets.for_namespace(namespace), key)?;
        tracing::debug!(namespace = %namespace, key, "Removed artifact");
        Ok(())
    }

    /// Create any missing bucket; returns the buckets created
    pub fn ensure_buckets(&self) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for namespace in Namespace::ALL {
            let bucket = self.buckets.for_namespace(namespace);
            if !self.backend.bucket_exists(bucket)? {
                self.backend.make_bucket(bucket)?;
                created.push(bucket.to_string());
            }
        }
        Ok(created)
    }

    /// Whether all three buckets exist
    pub fn buckets_ready(&self) -> Result<bool> {
        for namespace in Namespace::ALL {
            if !self
                .backend
                .bucket_exists(self.buckets.for_namespace(namespace))?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
