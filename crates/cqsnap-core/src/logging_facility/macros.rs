//! Canonical logging macros
//!
//! Callers need `tracing` as a dependency; field keys come from
//! `cqsnap_core_types::schema`.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use cqsnap_core::log_op_start;
/// log_op_start!("build");
/// log_op_start!("build", global_id = "abc");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use cqsnap_core::log_op_end;
/// log_op_end!("build", duration_ms = 42);
/// log_op_end!("build", duration_ms = 42, state = "NOT_ANALYZED");
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// Takes a reference to a `SnapError`.
///
/// # Example
///
/// ```
/// # use cqsnap_core::{log_op_error, SnapError, SnapErrorKind};
/// let err = SnapError::new(SnapErrorKind::Storage).with_message("bucket missing");
/// log_op_error!("build", &err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let snap_err: &$crate::errors::SnapError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?snap_err.kind(),
            err_code = snap_err.code(),
            error = %snap_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let snap_err: &$crate::errors::SnapError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?snap_err.kind(),
            err_code = snap_err.code(),
            error = %snap_err,
            $($field)*
        );
    }};
}

/// Log a concurrency anomaly; the operation carries on
///
/// # Example
///
/// ```
/// # use cqsnap_core::log_anomaly;
/// log_anomaly!("reconcile", "row vanished", global_id = "abc");
/// ```
#[macro_export]
macro_rules! log_anomaly {
    ($op:expr, $msg:expr) => {
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_ANOMALY,
            "{}",
            $msg
        );
    };
    ($op:expr, $msg:expr, $($field:tt)*) => {
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_ANOMALY,
            $($field)*,
            "{}",
            $msg
        );
    };
}
