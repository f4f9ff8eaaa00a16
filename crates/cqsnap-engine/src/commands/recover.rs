//! Operator recovery of stuck snapshots
//!
//! A worker killed mid-execution leaves its row in `*_IN_PROGRESS` and no
//! claim selects it again. `recover` returns such a row to the stage's
//! pending state. Rows are only recovered by explicit id; there is no
//! timeout-based recovery.

use crate::context::SnapshotContext;
use cqsnap_core::lifecycle::{check_transition, recover_target};
use cqsnap_core::{log_op_end, log_op_error, log_op_start, SnapshotState};
use cqsnap_store::db::{begin_locked, LockMode};
use cqsnap_store::errors::{from_rusqlite, lock_timeout as lock_timeout_error};
use cqsnap_store::{Result, SnapshotRepo};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverOutcome {
    Recovered {
        global_id: String,
        from: SnapshotState,
        to: SnapshotState,
    },
    /// Row is not in an in-progress state; left unchanged
    NotStuck {
        global_id: String,
        state: SnapshotState,
    },
    NotFound { global_id: String },
}

impl fmt::Display for RecoverOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoverOutcome::Recovered { global_id, from, to } => {
                write!(f, "Snapshot {} recovered from {} to {}.", global_id, from, to)
            }
            RecoverOutcome::NotStuck { global_id, state } => write!(
                f,
                "Snapshot {} is in state {}, not in progress. Nothing to recover.",
                global_id, state
            ),
            RecoverOutcome::NotFound { global_id } => write!(f, "No snapshot with id {}!", global_id),
        }
    }
}

/// Reset a stuck in-progress snapshot to its stage's pending state
pub fn recover(ctx: &mut SnapshotContext, global_id: &str) -> Result<RecoverOutcome> {
    log_op_start!("recover", global_id = global_id);
    let start = Instant::now();

    let outcome = recover_impl(ctx, global_id).map_err(|e| {
        log_op_error!(
            "recover",
            &e,
            duration_ms = start.elapsed().as_millis() as u64,
            global_id = global_id
        );
        e
    })?;

    log_op_end!(
        "recover",
        duration_ms = start.elapsed().as_millis() as u64,
        outcome = %outcome
    );
    Ok(outcome)
}

fn recover_impl(ctx: &mut SnapshotContext, global_id: &str) -> Result<RecoverOutcome> {
    let lock_timeout = ctx.lock_timeout;
    let tx = begin_locked(&mut ctx.conn, LockMode::Wait, lock_timeout)?
        .ok_or_else(|| lock_timeout_error("recover"))?;

    let Some(snapshot) = SnapshotRepo::find_by_id(&tx, global_id)? else {
        return Ok(RecoverOutcome::NotFound {
            global_id: global_id.to_string(),
        });
    };

    let from = snapshot.state();
    let outcome = match recover_target(from) {
        Some(to) => {
            check_transition(from, to)?;
            SnapshotRepo::compare_and_set_state(&tx, global_id, from, to)?;
            RecoverOutcome::Recovered {
                global_id: global_id.to_string(),
                from,
                to,
            }
        }
        None => RecoverOutcome::NotStuck {
            global_id: global_id.to_string(),
            state: from,
        },
    };

    tx.commit().map_err(from_rusqlite)?;
    Ok(outcome)
}
