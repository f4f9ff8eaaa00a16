//! Error handling for cqsnap-store
//!
//! Wraps cqsnap-core SnapError with store-specific helpers

use cqsnap_core::errors::{SnapError, SnapErrorKind};
use rusqlite::ErrorCode;

/// Result type alias using SnapError
pub type Result<T> = std::result::Result<T, SnapError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> SnapError {
    SnapError::new(SnapErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> SnapError {
    SnapError::new(SnapErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> SnapError {
    SnapError::new(SnapErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// The write lock could not be taken within the lock timeout
pub fn lock_timeout(op: &str) -> SnapError {
    SnapError::new(SnapErrorKind::Persistence)
        .with_op(op.to_string())
        .with_message("timed out waiting for the metadata store lock")
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> SnapError {
    SnapError::new(SnapErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Blob store failure other than "not found"
pub fn storage_error(operation: &str, message: impl Into<String>) -> SnapError {
    SnapError::new(SnapErrorKind::Storage)
        .with_op(operation.to_string())
        .with_message(message)
}

/// Archive creation or extraction failure
pub fn archive_error(operation: &str, message: impl Into<String>) -> SnapError {
    SnapError::new(SnapErrorKind::Archive)
        .with_op(operation.to_string())
        .with_message(message)
}

/// SQLITE_BUSY or SQLITE_LOCKED
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

/// Unique or primary key constraint violation
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}
