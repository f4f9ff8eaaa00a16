//! Deletion flow
//!
//! Removes a snapshot row with its database bundle and results. The source
//! archive is removed only when no other snapshot shares its `source_id`.
//! Everything runs inside one locked transaction so a concurrent
//! registration cannot re-use the source archive while it is removed.

use crate::context::SnapshotContext;
use cqsnap_core::{log_op_end, log_op_error, log_op_start};
use cqsnap_store::db::{begin_locked, LockMode};
use cqsnap_store::errors::{from_rusqlite, lock_timeout as lock_timeout_error};
use cqsnap_store::{Namespace, Result, SnapshotRepo};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted {
        global_id: String,
        /// Artifacts removed alongside the row
        removed: Vec<Namespace>,
    },
    NotFound { global_id: String },
}

impl DeleteOutcome {
    /// Whether the shared source archive went with the row
    pub fn source_removed(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { removed, .. } if removed.contains(&Namespace::Source))
    }
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::Deleted { global_id, removed } => {
                let removed: Vec<&str> = removed.iter().map(|ns| ns.as_str()).collect();
                if removed.is_empty() {
                    write!(f, "Deleted snapshot {}.", global_id)
                } else {
                    write!(f, "Deleted snapshot {} and its {} artifacts.", global_id, removed.join(", "))
                }
            }
            DeleteOutcome::NotFound { global_id } => write!(f, "No snapshot with id {}!", global_id),
        }
    }
}

/// Delete a snapshot and the artifacts only it references
pub fn delete(ctx: &mut SnapshotContext, global_id: &str) -> Result<DeleteOutcome> {
    log_op_start!("delete", global_id = global_id);
    let start = Instant::now();

    let outcome = delete_impl(ctx, global_id).map_err(|e| {
        log_op_error!(
            "delete",
            &e,
            duration_ms = start.elapsed().as_millis() as u64,
            global_id = global_id
        );
        e
    })?;

    log_op_end!(
        "delete",
        duration_ms = start.elapsed().as_millis() as u64,
        outcome = %outcome
    );
    Ok(outcome)
}

fn delete_impl(ctx: &mut SnapshotContext, global_id: &str) -> Result<DeleteOutcome> {
    let lock_timeout = ctx.lock_timeout;
    let tx = begin_locked(&mut ctx.conn, LockMode::Wait, lock_timeout)?
        .ok_or_else(|| lock_timeout_error("delete"))?;
    let artifacts = &ctx.artifacts;

    let Some(snapshot) = SnapshotRepo::find_by_id(&tx, global_id)? else {
        return Ok(DeleteOutcome::NotFound {
            global_id: global_id.to_string(),
        });
    };

    let mut removed = Vec::new();
    let sharing = SnapshotRepo::count_sharing_source(&tx, snapshot.source_id(), global_id)?;
    if sharing == 0 {
        if artifacts.exists(Namespace::Source, snapshot.source_id())? {
            artifacts.remove(Namespace::Source, snapshot.source_id())?;
            removed.push(Namespace::Source);
        }
    } else {
        tracing::debug!(
            global_id,
            source_id = snapshot.source_id(),
            sharing,
            "Source archive shared, keeping it"
        );
    }

    for namespace in [Namespace::Database, Namespace::Sarif] {
        if artifacts.exists(namespace, global_id)? {
            artifacts.remove(namespace, global_id)?;
            removed.push(namespace);
        }
    }

    SnapshotRepo::delete(&tx, global_id)?;
    tx.commit().map_err(from_rusqlite)?;

    Ok(DeleteOutcome::Deleted {
        global_id: global_id.to_string(),
        removed,
    })
}
