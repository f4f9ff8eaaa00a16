//! Command orchestration layer
//!
//! One module per CLI command. Each public entry point owns the lifecycle
//! logging for its operation (`log_op_start!`, `log_op_end!`,
//! `log_op_error!`); the store and core layers log at debug level only.

pub mod analyze;
pub mod build;
pub mod delete;
pub mod get_object;
pub mod init;
pub mod list;
pub mod recover;
pub mod register;
pub mod stage;

pub use analyze::analyze;
pub use build::build;
pub use delete::{delete, DeleteOutcome};
pub use get_object::{get_object, GetObjectOutcome, ObjectKind};
pub use init::{init, InitReport};
pub use list::{list, render_table, SnapshotRecord};
pub use recover::{recover, RecoverOutcome};
pub use register::{register, RegisterOutcome, RegisterRequest};
pub use stage::StageReport;
