//! Subcommand handlers
//!
//! Each handler turns its arguments into an engine call and returns the
//! one-line outcome to print.

pub mod add;
pub mod admin;
pub mod get_object;
pub mod init;
pub mod list;
pub mod worker;
