//! Row hydration
//!
//! Rows are read into plain column values inside the rusqlite closure and
//! converted to domain types outside it, so decoding failures surface as
//! `Serialization` errors rather than rusqlite errors.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use cqsnap_core::errors::{SnapError, SnapErrorKind};
use cqsnap_core::{Snapshot, SnapshotIdentity, SnapshotLanguage, SnapshotState};
use rusqlite::Row;

/// Column list matching [`SnapshotRow::from_row`]
pub const SNAPSHOT_COLUMNS: &str = "global_id, source_id, project_url, branch, commit_sha, \
     language, category, state, label, created_at, updated_at";

/// Raw column values of a `snapshots` row
pub struct SnapshotRow {
    global_id: String,
    source_id: String,
    project_url: String,
    branch: String,
    commit_sha: String,
    language: String,
    category: Option<String>,
    state: String,
    label: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SnapshotRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            global_id: row.get(0)?,
            source_id: row.get(1)?,
            project_url: row.get(2)?,
            branch: row.get(3)?,
            commit_sha: row.get(4)?,
            language: row.get(5)?,
            category: row.get(6)?,
            state: row.get(7)?,
            label: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn into_snapshot(self) -> Result<Snapshot> {
        let language: SnapshotLanguage = self.language.parse()?;
        let state: SnapshotState = self.state.parse()?;
        let identity = SnapshotIdentity::new(
            self.project_url,
            self.branch,
            self.commit_sha,
            language,
            self.category,
        )?;

        Ok(Snapshot::hydrate(
            self.global_id,
            self.source_id,
            identity,
            state,
            self.label,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        ))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            SnapError::new(SnapErrorKind::Serialization)
                .with_op("hydrate_snapshot")
                .with_message(format!("invalid timestamp '{}': {}", value, e))
        })
}
