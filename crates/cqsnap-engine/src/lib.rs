//! codeql-snapshot engine - command orchestration
//!
//! Coordinates the metadata store, the artifact gateway and the analysis
//! engine for each CLI command. Commands take a [`SnapshotContext`] built
//! once per invocation.

pub mod commands;
pub mod context;
pub mod engine;
pub mod vcs;

pub use context::{SnapshotContext, StoreConfig};
pub use engine::{AnalysisEngine, BuildStrategy, CodeqlCli, EngineError};
