//! Snapshot repository
//!
//! Statement-level operations take a `&Connection` so they run unchanged
//! inside a transaction or savepoint. `claim` and `reconcile` open their own
//! locked transaction and commit before returning.

use crate::db::{begin_locked, LockMode};
use crate::errors::{from_rusqlite, is_unique_violation, lock_timeout as lock_timeout_error, Result};
use crate::repo::hydration::{SnapshotRow, SNAPSHOT_COLUMNS};
use cqsnap_core::lifecycle::{check_transition, Outcome, Stage};
use cqsnap_core::{log_anomaly, Snapshot, SnapshotIdentity, SnapshotState};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;

/// Row selection for a claim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimFilter {
    /// Explicit snapshot; claims for an explicit id wait for the lock
    pub global_id: Option<String>,
    /// Work-partition tag; `None` matches every label
    pub label: Option<String>,
    /// Select the failed state instead of the pending one
    pub retry: bool,
}

impl ClaimFilter {
    pub fn lock_mode(&self) -> LockMode {
        if self.global_id.is_some() {
            LockMode::Wait
        } else {
            LockMode::SkipLocked
        }
    }
}

/// Result of an insert attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Result of the reconcile transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    Written {
        from: SnapshotState,
        to: SnapshotState,
    },
    /// The row was deleted while the worker executed
    Vanished,
}

/// SQLite repository for snapshots
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// Insert a new snapshot in `NOT_BUILT`
    ///
    /// A duplicate identity or global id reports `AlreadyExists`; run inside
    /// a savepoint so the failed statement leaves the outer transaction usable.
    pub fn insert(
        conn: &Connection,
        identity: &SnapshotIdentity,
        label: Option<&str>,
    ) -> Result<InsertOutcome> {
        let inserted = conn.execute(
            "INSERT INTO snapshots
                (global_id, source_id, project_url, branch, commit_sha, language, category, state, label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                identity.global_id(),
                identity.source_id(),
                identity.project_url(),
                identity.branch(),
                identity.commit(),
                identity.language().as_str(),
                identity.category(),
                SnapshotState::NotBuilt.as_str(),
                label,
            ],
        );

        match inserted {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::AlreadyExists),
            Err(err) => Err(from_rusqlite(err)),
        }
    }

    pub fn find_by_id(conn: &Connection, global_id: &str) -> Result<Option<Snapshot>> {
        let sql = format!(
            "SELECT {} FROM snapshots WHERE global_id = ?1",
            SNAPSHOT_COLUMNS
        );
        conn.query_row(&sql, [global_id], SnapshotRow::from_row)
            .optional()
            .map_err(from_rusqlite)?
            .map(SnapshotRow::into_snapshot)
            .transpose()
    }

    /// Look up by the full identity tuple
    pub fn find_by_identity(
        conn: &Connection,
        identity: &SnapshotIdentity,
    ) -> Result<Option<Snapshot>> {
        let sql = format!(
            "SELECT {} FROM snapshots
             WHERE project_url = ?1 AND branch = ?2 AND commit_sha = ?3 AND language = ?4
               AND COALESCE(category, '') = COALESCE(?5, '')",
            SNAPSHOT_COLUMNS
        );
        conn.query_row(
            &sql,
            params![
                identity.project_url(),
                identity.branch(),
                identity.commit(),
                identity.language().as_str(),
                identity.category(),
            ],
            SnapshotRow::from_row,
        )
        .optional()
        .map_err(from_rusqlite)?
        .map(SnapshotRow::into_snapshot)
        .transpose()
    }

    /// Set the state of a row; `updated_at` is refreshed by trigger
    ///
    /// Returns false when no row has this id.
    pub fn update_state(conn: &Connection, global_id: &str, state: SnapshotState) -> Result<bool> {
        let changed = conn
            .execute(
                "UPDATE snapshots SET state = ?1 WHERE global_id = ?2",
                params![state.as_str(), global_id],
            )
            .map_err(from_rusqlite)?;
        Ok(changed == 1)
    }

    /// Update a row only if it is still in `expected`
    pub fn compare_and_set_state(
        conn: &Connection,
        global_id: &str,
        expected: SnapshotState,
        state: SnapshotState,
    ) -> Result<bool> {
        let changed = conn
            .execute(
                "UPDATE snapshots SET state = ?1 WHERE global_id = ?2 AND state = ?3",
                params![state.as_str(), global_id, expected.as_str()],
            )
            .map_err(from_rusqlite)?;
        Ok(changed == 1)
    }

    /// Rows other than `global_id` sharing its source archive
    pub fn count_sharing_source(conn: &Connection, source_id: &str, global_id: &str) -> Result<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE source_id = ?1 AND global_id != ?2",
            params![source_id, global_id],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)
    }

    pub fn delete(conn: &Connection, global_id: &str) -> Result<bool> {
        let deleted = conn
            .execute("DELETE FROM snapshots WHERE global_id = ?1", [global_id])
            .map_err(from_rusqlite)?;
        Ok(deleted == 1)
    }

    /// All snapshots, oldest first
    pub fn list(conn: &Connection) -> Result<Vec<Snapshot>> {
        let sql = format!(
            "SELECT {} FROM snapshots ORDER BY created_at, global_id",
            SNAPSHOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map([], SnapshotRow::from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }

    /// Claim one row for `stage`
    ///
    /// Selects at most one row in the claimable state matching `filter`,
    /// moves it to the stage's in-progress state and commits. Returns the
    /// claimed row, or `None` when nothing matches or, in skip-locked mode,
    /// another writer kept the lock past [`crate::db::CLAIM_BUSY_WAIT`].
    pub fn claim(
        conn: &mut Connection,
        stage: Stage,
        filter: &ClaimFilter,
        lock_timeout: Duration,
    ) -> Result<Option<Snapshot>> {
        let Some(tx) = begin_locked(conn, filter.lock_mode(), lock_timeout)? else {
            return Ok(None);
        };

        let from = stage.claimable_state(filter.retry);
        let to = stage.in_progress_state();
        check_transition(from, to)?;

        let sql = format!(
            "SELECT {} FROM snapshots
             WHERE state = ?1
               AND (?2 IS NULL OR global_id = ?2)
               AND (?3 IS NULL OR label = ?3)
             ORDER BY created_at, global_id
             LIMIT 1",
            SNAPSHOT_COLUMNS
        );
        let selected = tx
            .query_row(
                &sql,
                params![from.as_str(), filter.global_id, filter.label],
                SnapshotRow::from_row,
            )
            .optional()
            .map_err(from_rusqlite)?;

        let Some(row) = selected else {
            return Ok(None);
        };
        let snapshot = row.into_snapshot()?;

        if !Self::compare_and_set_state(&tx, snapshot.global_id(), from, to)? {
            return Ok(None);
        }
        let claimed = Self::find_by_id(&tx, snapshot.global_id())?;
        tx.commit().map_err(from_rusqlite)?;

        Ok(claimed)
    }

    /// Write the final state of a claimed row
    ///
    /// Blocks until the lock is free; `lock_timeout` only paces the
    /// "still waiting" warnings. A vanished row is reported, not an error. A
    /// row found outside the stage's in-progress state is logged as an
    /// anomaly and still written.
    pub fn reconcile(
        conn: &mut Connection,
        stage: Stage,
        global_id: &str,
        outcome: Outcome,
        lock_timeout: Duration,
    ) -> Result<ReconcileResult> {
        let tx = begin_locked(conn, LockMode::Block, lock_timeout)?
            .ok_or_else(|| lock_timeout_error("reconcile"))?;

        let to = stage.outcome_state(outcome);
        let Some(current) = Self::find_by_id(&tx, global_id)? else {
            log_anomaly!(
                "reconcile",
                "snapshot vanished before reconcile",
                global_id = global_id,
                stage = stage.as_str()
            );
            return Ok(ReconcileResult::Vanished);
        };

        let from = current.state();
        if from != stage.in_progress_state() {
            log_anomaly!(
                "reconcile",
                "snapshot left the in-progress state during execution",
                global_id = global_id,
                stage = stage.as_str(),
                state = from.as_str()
            );
        }

        Self::update_state(&tx, global_id, to)?;
        tx.commit().map_err(from_rusqlite)?;

        Ok(ReconcileResult::Written { from, to })
    }
}
