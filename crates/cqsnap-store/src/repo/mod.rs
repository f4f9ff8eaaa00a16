//! Repository layer over the `snapshots` table

pub mod hydration;
pub mod snapshot_repo;

pub use snapshot_repo::{ClaimFilter, InsertOutcome, ReconcileResult, SnapshotRepo};
