//! codeql-snapshot core - snapshot domain model and lifecycle rules
//!
//! This crate provides the storage-independent parts of the pipeline:
//! - Snapshot identity, states and languages with their stored representation
//! - Content addressing for global and source identifiers
//! - The lifecycle state machine shared by the build and analyze stages
//! - The structured error facility and logging facility used by every crate

pub mod digest;
pub mod errors;
pub mod lifecycle;
pub mod logging_facility;
pub mod model;

// Re-exported so the logging macros resolve for downstream crates
pub use cqsnap_core_types as core_types;

// Re-export commonly used types
pub use errors::{ModelError, Result, SnapError, SnapErrorKind};
pub use lifecycle::{Outcome, Stage};
pub use model::{Snapshot, SnapshotIdentity, SnapshotLanguage, SnapshotState};
