//! Claim, execute, reconcile
//!
//! Build and analyze share one protocol. The claim and reconcile
//! transactions hold the store lock only briefly; execution runs unlocked.
//! Any error raised while executing becomes [`Outcome::Failed`], so a
//! claimed row always reaches reconcile.

use crate::context::SnapshotContext;
use cqsnap_core::{Outcome, Snapshot, SnapshotState, Stage};
use cqsnap_store::errors::io_error;
use cqsnap_store::{ClaimFilter, ReconcileResult, Result, SnapshotRepo};
use std::fmt;
use tempfile::TempDir;

/// What a worker invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    /// No row matched the claim
    NothingToDo { stage: Stage },
    Completed {
        stage: Stage,
        global_id: String,
        outcome: Outcome,
        state: SnapshotState,
    },
    /// The row was deleted during execution; no state was written
    Vanished {
        stage: Stage,
        global_id: String,
        outcome: Outcome,
    },
}

impl StageReport {
    pub fn global_id(&self) -> Option<&str> {
        match self {
            StageReport::NothingToDo { .. } => None,
            StageReport::Completed { global_id, .. } | StageReport::Vanished { global_id, .. } => {
                Some(global_id)
            }
        }
    }

    /// Final state written by reconcile, if any
    pub fn state(&self) -> Option<SnapshotState> {
        match self {
            StageReport::Completed { state, .. } => Some(*state),
            _ => None,
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageReport::NothingToDo { stage } => {
                write!(f, "Nothing to {}: no snapshot matched the claim.", stage)
            }
            StageReport::Completed {
                stage,
                global_id,
                state,
                ..
            } => write!(f, "Snapshot {} finished {} in state {}.", global_id, stage, state),
            StageReport::Vanished { stage, global_id, .. } => write!(
                f,
                "Snapshot {} was deleted during {}; nothing recorded.",
                global_id, stage
            ),
        }
    }
}

/// Run one claim, execute, reconcile cycle for `stage`
pub(crate) fn run_stage<F>(
    ctx: &mut SnapshotContext,
    stage: Stage,
    filter: &ClaimFilter,
    execute: F,
) -> Result<StageReport>
where
    F: FnOnce(&SnapshotContext, &Snapshot) -> Result<Outcome>,
{
    let lock_timeout = ctx.lock_timeout;
    let Some(snapshot) = SnapshotRepo::claim(&mut ctx.conn, stage, filter, lock_timeout)? else {
        tracing::debug!(stage = stage.as_str(), retry = filter.retry, "Nothing to claim");
        return Ok(StageReport::NothingToDo { stage });
    };

    let global_id = snapshot.global_id().to_string();
    tracing::info!(
        global_id = %global_id,
        stage = stage.as_str(),
        state = snapshot.state().as_str(),
        "Claimed snapshot"
    );

    let outcome = match execute(ctx, &snapshot) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(
                global_id = %global_id,
                stage = stage.as_str(),
                err_code = err.code(),
                error = %err,
                "Execution failed"
            );
            Outcome::Failed
        }
    };

    let report = match SnapshotRepo::reconcile(&mut ctx.conn, stage, &global_id, outcome, lock_timeout)? {
        ReconcileResult::Written { to, .. } => StageReport::Completed {
            stage,
            global_id,
            outcome,
            state: to,
        },
        ReconcileResult::Vanished => StageReport::Vanished {
            stage,
            global_id,
            outcome,
        },
    };
    Ok(report)
}

/// Scratch directory removed when dropped
pub(crate) fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| io_error("scratch_dir", e))
}
