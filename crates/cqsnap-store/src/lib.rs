//! codeql-snapshot store - metadata and artifact persistence
//!
//! Provides:
//! - SQLite schema with migrations framework
//! - Snapshot repository with locked claim and reconcile transactions
//! - Artifact gateway over bucketed object storage
//! - Deterministic directory archives

pub mod archive;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod objects;
pub mod repo;

// Re-export key types
pub use db::LockMode;
pub use errors::Result;
pub use objects::{ArtifactStore, BucketNames, FsObjectStore, Namespace, ObjectStore};
pub use repo::{ClaimFilter, InsertOutcome, ReconcileResult, SnapshotRepo};
