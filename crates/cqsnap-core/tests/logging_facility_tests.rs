#![allow(clippy::unwrap_used, clippy::expect_used)]

use cqsnap_core::logging_facility::test_capture::init_test_capture;
use cqsnap_core::{log_anomaly, log_op_end, log_op_error, log_op_start};
use cqsnap_core::{SnapError, SnapErrorKind};
use cqsnap_core_types::schema::{EVENT_ANOMALY, EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "log_op_start_unique_1";

    log_op_start!(op_name, global_id = "g1");

    let starts = capture.find(op_name, EVENT_START);
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].field("global_id"), Some("g1"));
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let ends = capture.find(op_name, EVENT_END);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "log_op_error_unique_3";

    let err = SnapError::new(SnapErrorKind::Storage).with_message("bucket missing");
    log_op_error!(op_name, &err, duration_ms = 10);

    let errors = capture.find(op_name, EVENT_END_ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field("err_code"), Some("ERR_STORAGE"));
    assert_eq!(errors[0].level, tracing::Level::ERROR);
}

#[test]
fn test_anomaly_is_warning_with_message() {
    let capture = init_test_capture();
    let op_name = "log_anomaly_unique_4";

    log_anomaly!(op_name, "row vanished before reconcile", global_id = "g4");

    let anomalies = capture.find(op_name, EVENT_ANOMALY);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].level, tracing::Level::WARN);
    assert_eq!(anomalies[0].field("global_id"), Some("g4"));
    assert_eq!(
        anomalies[0].field("message"),
        Some("row vanished before reconcile")
    );
}

#[test]
fn test_boundary_pair() {
    let capture = init_test_capture();
    let op_name = "log_boundary_unique_5";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 1);

    assert_eq!(
        capture.count_events(|e| e.op.as_deref() == Some(op_name)),
        2
    );
}
