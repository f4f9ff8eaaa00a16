//! Registration flow (`add`)
//!
//! Registers a source tree as a snapshot and stores its source archive.
//! Re-registering a known identity resets failed snapshots so workers pick
//! them up again.
//!
//! The source archive is keyed by `source_id`, which the identity alone
//! determines. When a new row, or an existing row headed for `NOT_BUILT`,
//! lacks its archive, the tree is archived and uploaded before the store
//! lock is taken.
//! The lookup, insert and any state change then run in one short locked
//! transaction that only probes the artifact store.

use crate::commands::stage::scratch_dir;
use crate::context::SnapshotContext;
use crate::vcs::{self, Wanted};
use cqsnap_core::errors::{SnapError, SnapErrorKind};
use cqsnap_core::lifecycle::{check_transition, registration_reset};
use cqsnap_core::{
    log_op_end, log_op_error, log_op_start, Snapshot, SnapshotIdentity, SnapshotLanguage,
    SnapshotState,
};
use cqsnap_store::archive::{archive_dir, ARCHIVE_SUFFIX};
use cqsnap_store::db::{begin_locked, LockMode};
use cqsnap_store::errors::{from_rusqlite, lock_timeout as lock_timeout_error};
use cqsnap_store::{ArtifactStore, InsertOutcome, Namespace, Result, SnapshotRepo};
use rusqlite::Connection;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Input of a registration
///
/// `project_url`, `branch` and `commit` default to the git metadata of
/// `source_root` when not given.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub source_root: PathBuf,
    pub language: SnapshotLanguage,
    pub project_url: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub category: Option<String>,
    pub label: Option<String>,
}

impl RegisterRequest {
    pub fn new(source_root: impl Into<PathBuf>, language: SnapshotLanguage) -> Self {
        Self {
            source_root: source_root.into(),
            language,
            project_url: None,
            branch: None,
            commit: None,
            category: None,
            label: None,
        }
    }
}

/// What a registration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// New snapshot in `NOT_BUILT` with its source archive stored
    Added { global_id: String },
    /// New snapshot, but the source archive could not be stored
    AddedWithoutSource { global_id: String },
    /// Another registration inserted the identity first
    AlreadyExists { global_id: String },
    /// A failed snapshot was reset for another attempt
    Reset {
        global_id: String,
        from: SnapshotState,
        to: SnapshotState,
    },
    /// A `NOT_BUILT` snapshot had lost its source archive; it was stored again
    SourceRestored { global_id: String },
    SourceRestoreFailed { global_id: String },
    /// Snapshot exists in a non-failed state
    Unchanged {
        global_id: String,
        state: SnapshotState,
    },
}

impl RegisterOutcome {
    pub fn global_id(&self) -> &str {
        match self {
            RegisterOutcome::Added { global_id }
            | RegisterOutcome::AddedWithoutSource { global_id }
            | RegisterOutcome::AlreadyExists { global_id }
            | RegisterOutcome::Reset { global_id, .. }
            | RegisterOutcome::SourceRestored { global_id }
            | RegisterOutcome::SourceRestoreFailed { global_id }
            | RegisterOutcome::Unchanged { global_id, .. } => global_id,
        }
    }
}

impl fmt::Display for RegisterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterOutcome::Added { global_id } => {
                write!(f, "Added snapshot {} in state {}.", global_id, SnapshotState::NotBuilt)
            }
            RegisterOutcome::AddedWithoutSource { global_id } => write!(
                f,
                "Added snapshot {} in state {}: failed to store the source archive.",
                global_id,
                SnapshotState::SnapshotFailed
            ),
            RegisterOutcome::AlreadyExists { global_id } => {
                write!(f, "Snapshot {} already exists.", global_id)
            }
            RegisterOutcome::Reset { global_id, from, to } => write!(
                f,
                "Snapshot {} in state {}. Reset to {} to retry.",
                global_id, from, to
            ),
            RegisterOutcome::SourceRestored { global_id } => write!(
                f,
                "Snapshot {} in state {} was missing its source archive. Stored it again.",
                global_id,
                SnapshotState::NotBuilt
            ),
            RegisterOutcome::SourceRestoreFailed { global_id } => write!(
                f,
                "Snapshot {} is missing its source archive and storing it failed. Set to {}.",
                global_id,
                SnapshotState::SnapshotFailed
            ),
            RegisterOutcome::Unchanged { global_id, state } => write!(
                f,
                "Snapshot {} already exists in non-failed state {}.",
                global_id, state
            ),
        }
    }
}

/// Register a source tree
///
/// ## Errors
///
/// - `Usage`: the source root is not a directory or the identity cannot be
///   resolved; nothing is written
/// - `Persistence`: the store lock timed out or a statement failed
/// - `Storage`: probing the artifact store failed
pub fn register(ctx: &mut SnapshotContext, request: &RegisterRequest) -> Result<RegisterOutcome> {
    log_op_start!(
        "register",
        source_root = %request.source_root.display(),
        language = request.language.as_str()
    );
    let start = Instant::now();

    let outcome = register_impl(ctx, request).map_err(|e| {
        log_op_error!("register", &e, duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "register",
        duration_ms = start.elapsed().as_millis() as u64,
        global_id = outcome.global_id(),
        outcome = %outcome
    );
    Ok(outcome)
}

fn register_impl(ctx: &mut SnapshotContext, request: &RegisterRequest) -> Result<RegisterOutcome> {
    if !request.source_root.is_dir() {
        return Err(usage(format!(
            "source root {} is not a directory",
            request.source_root.display()
        )));
    }
    let identity = resolve_identity(request)?;
    let source_id = identity.source_id();

    // Unlocked look ahead; the locked transaction below re-reads the row
    let needs_source = !ctx.artifacts.exists(Namespace::Source, &source_id)?
        && SnapshotRepo::find_by_identity(&ctx.conn, &identity)?
            .map_or(true, |existing| {
                matches!(
                    existing.state(),
                    SnapshotState::NotBuilt | SnapshotState::BuildFailed | SnapshotState::SnapshotFailed
                )
            });
    let uploaded = if needs_source {
        store_source(&ctx.artifacts, &request.source_root, &source_id).unwrap_or_else(|err| {
            tracing::warn!(
                source_id = %source_id,
                err_code = err.code(),
                error = %err,
                "Failed to store source archive"
            );
            false
        })
    } else {
        false
    };

    let lock_timeout = ctx.lock_timeout;
    let mut tx = begin_locked(&mut ctx.conn, LockMode::Wait, lock_timeout)?
        .ok_or_else(|| lock_timeout_error("register"))?;
    // Probed under the lock: a concurrent delete may have removed it
    let source_present = ctx.artifacts.exists(Namespace::Source, &source_id)?;

    let outcome = match SnapshotRepo::find_by_identity(&tx, &identity)? {
        None => {
            let inserted = {
                let sp = tx.savepoint().map_err(from_rusqlite)?;
                let inserted = SnapshotRepo::insert(&sp, &identity, request.label.as_deref())?;
                if inserted == InsertOutcome::Inserted {
                    sp.commit().map_err(from_rusqlite)?;
                }
                inserted
            };
            let global_id = identity.global_id();
            match inserted {
                InsertOutcome::Inserted if source_present => RegisterOutcome::Added { global_id },
                InsertOutcome::Inserted => {
                    fail_snapshot(&tx, &global_id, SnapshotState::NotBuilt)?;
                    RegisterOutcome::AddedWithoutSource { global_id }
                }
                InsertOutcome::AlreadyExists => RegisterOutcome::AlreadyExists { global_id },
            }
        }
        Some(existing) => re_register(&tx, &existing, source_present, uploaded)?,
    };

    tx.commit().map_err(from_rusqlite)?;
    Ok(outcome)
}

fn resolve_identity(request: &RegisterRequest) -> Result<SnapshotIdentity> {
    let wanted = Wanted {
        project_url: request.project_url.is_none(),
        branch: request.branch.is_none(),
        commit: request.commit.is_none(),
    };
    let git = vcs::resolve(&request.source_root, wanted)?;

    SnapshotIdentity::new(
        request.project_url.clone().unwrap_or(git.project_url),
        request.branch.clone().unwrap_or(git.branch),
        request.commit.clone().unwrap_or(git.commit),
        request.language,
        request.category.clone(),
    )
    .map_err(|e| usage(e.to_string()))
}

fn re_register(
    conn: &Connection,
    existing: &Snapshot,
    source_present: bool,
    uploaded: bool,
) -> Result<RegisterOutcome> {
    let global_id = existing.global_id().to_string();
    let state = existing.state();

    if state == SnapshotState::NotBuilt {
        return if !source_present {
            fail_snapshot(conn, &global_id, state)?;
            Ok(RegisterOutcome::SourceRestoreFailed { global_id })
        } else if uploaded {
            Ok(RegisterOutcome::SourceRestored { global_id })
        } else {
            Ok(RegisterOutcome::Unchanged { global_id, state })
        };
    }

    match registration_reset(state, source_present) {
        Some(to) => {
            check_transition(state, to)?;
            SnapshotRepo::update_state(conn, &global_id, to)?;
            Ok(RegisterOutcome::Reset {
                global_id,
                from: state,
                to,
            })
        }
        None => Ok(RegisterOutcome::Unchanged { global_id, state }),
    }
}

/// Archive and store the source tree unless an archive already exists
///
/// Returns whether an archive was uploaded.
fn store_source(artifacts: &ArtifactStore, source_root: &Path, source_id: &str) -> Result<bool> {
    if artifacts.exists(Namespace::Source, source_id)? {
        tracing::debug!(source_id, "Source archive already stored");
        return Ok(false);
    }

    let scratch = scratch_dir("cqsnap-register-")?;
    let archive = scratch
        .path()
        .join(format!("{}{}", source_id, ARCHIVE_SUFFIX));
    archive_dir(source_root, &archive)?;
    artifacts.put(Namespace::Source, source_id, &archive)?;
    Ok(true)
}

fn fail_snapshot(conn: &Connection, global_id: &str, from: SnapshotState) -> Result<()> {
    check_transition(from, SnapshotState::SnapshotFailed)?;
    SnapshotRepo::update_state(conn, global_id, SnapshotState::SnapshotFailed)?;
    Ok(())
}

fn usage(message: String) -> SnapError {
    SnapError::new(SnapErrorKind::Usage)
        .with_op("register")
        .with_message(message)
}
