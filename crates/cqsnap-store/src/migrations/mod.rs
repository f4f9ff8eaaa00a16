//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums and idempotent application
//! - Embedded SQL migrations
//! - Initialization probe used as the precondition of every command

mod checksums;
mod embedded;
mod runner;

pub use runner::{apply_migrations, is_initialized};
