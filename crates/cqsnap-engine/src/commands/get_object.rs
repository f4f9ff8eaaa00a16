//! Download a snapshot's database bundle or analysis results

use crate::context::SnapshotContext;
use cqsnap_core::errors::{SnapError, SnapErrorKind};
use cqsnap_core::{log_op_end, log_op_error, log_op_start};
use cqsnap_store::{Namespace, Result, SnapshotRepo};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

/// Downloadable artifact kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Database,
    Sarif,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Database => "database",
            ObjectKind::Sarif => "sarif",
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            ObjectKind::Database => Namespace::Database,
            ObjectKind::Sarif => Namespace::Sarif,
        }
    }

    /// File extension of the downloaded object
    pub fn extension(&self) -> &'static str {
        match self {
            ObjectKind::Database => "zip",
            ObjectKind::Sarif => "sarif",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = SnapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "database" => Ok(ObjectKind::Database),
            "sarif" => Ok(ObjectKind::Sarif),
            _ => Err(SnapError::new(SnapErrorKind::Usage)
                .with_op("get_object")
                .with_message(format!("unknown object type '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetObjectOutcome {
    Downloaded { path: PathBuf },
    /// Target file exists; nothing was written
    AlreadyPresent { path: PathBuf },
    MissingObject { global_id: String, kind: ObjectKind },
    UnknownSnapshot { global_id: String },
}

impl fmt::Display for GetObjectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetObjectOutcome::Downloaded { path } => write!(f, "Downloaded {}.", path.display()),
            GetObjectOutcome::AlreadyPresent { path } => {
                write!(f, "File already exists at {}!", path.display())
            }
            GetObjectOutcome::MissingObject { global_id, kind } => {
                write!(f, "No {} for snapshot with id {}!", kind, global_id)
            }
            GetObjectOutcome::UnknownSnapshot { global_id } => {
                write!(f, "No snapshot with id {}!", global_id)
            }
        }
    }
}

/// Download the `kind` object of a snapshot into `directory`
///
/// The file is named `<global_id>.zip` or `<global_id>.sarif`. An existing
/// file is never overwritten.
pub fn get_object(
    ctx: &SnapshotContext,
    global_id: &str,
    kind: ObjectKind,
    directory: &Path,
) -> Result<GetObjectOutcome> {
    log_op_start!("get_object", global_id = global_id, kind = kind.as_str());
    let start = Instant::now();

    let outcome = get_object_impl(ctx, global_id, kind, directory).map_err(|e| {
        log_op_error!("get_object", &e, duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "get_object",
        duration_ms = start.elapsed().as_millis() as u64,
        outcome = %outcome
    );
    Ok(outcome)
}

fn get_object_impl(
    ctx: &SnapshotContext,
    global_id: &str,
    kind: ObjectKind,
    directory: &Path,
) -> Result<GetObjectOutcome> {
    if !directory.is_dir() {
        return Err(SnapError::new(SnapErrorKind::Usage)
            .with_op("get_object")
            .with_message(format!("{} is not a directory", directory.display())));
    }

    if SnapshotRepo::find_by_id(ctx.conn(), global_id)?.is_none() {
        return Ok(GetObjectOutcome::UnknownSnapshot {
            global_id: global_id.to_string(),
        });
    }

    let path = directory.join(format!("{}.{}", global_id, kind.extension()));
    if path.exists() {
        return Ok(GetObjectOutcome::AlreadyPresent { path });
    }

    if !ctx.artifacts().exists(kind.namespace(), global_id)? {
        return Ok(GetObjectOutcome::MissingObject {
            global_id: global_id.to_string(),
            kind,
        });
    }

    ctx.artifacts().get(kind.namespace(), global_id, &path)?;
    Ok(GetObjectOutcome::Downloaded { path })
}
