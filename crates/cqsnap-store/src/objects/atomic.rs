//! Atomic write primitives
//!
//! Uses temp→rename so a reader never observes a partial object

use crate::errors::{io_error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp path next to `target`, unique per process and call
fn temp_path(target: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = target
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), n))
}

/// Atomically copy `src` to `target`, creating parent directories
pub fn atomic_copy(src: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_object_dir", e))?;
    }

    let temp = temp_path(target);
    if let Err(e) = fs::copy(src, &temp) {
        fs::remove_file(&temp).ok();
        return Err(io_error("write_object_temp", e));
    }

    fs::rename(&temp, target).map_err(|e| {
        fs::remove_file(&temp).ok();
        io_error("rename_object_temp", e)
    })
}
