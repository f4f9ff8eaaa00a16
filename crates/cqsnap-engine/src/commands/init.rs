//! Store initialization
//!
//! Applies pending migrations and creates missing buckets. Safe to run any
//! number of times.

use crate::context::SnapshotContext;
use cqsnap_core::{log_op_end, log_op_error, log_op_start};
use cqsnap_store::migrations::apply_migrations;
use cqsnap_store::Result;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Buckets that did not exist before
    pub buckets_created: Vec<String>,
    /// `None` when the engine could not be reached
    pub engine_version: Option<String>,
}

impl fmt::Display for InitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.buckets_created.is_empty() {
            write!(f, "Store initialized.")
        } else {
            write!(
                f,
                "Store initialized, created buckets: {}.",
                self.buckets_created.join(", ")
            )
        }
    }
}

pub fn init(ctx: &mut SnapshotContext) -> Result<InitReport> {
    log_op_start!("init");
    let start = Instant::now();

    let report = init_impl(ctx).map_err(|e| {
        log_op_error!("init", &e, duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "init",
        duration_ms = start.elapsed().as_millis() as u64,
        buckets_created = report.buckets_created.len()
    );
    Ok(report)
}

fn init_impl(ctx: &mut SnapshotContext) -> Result<InitReport> {
    apply_migrations(&mut ctx.conn)?;
    let buckets_created = ctx.artifacts.ensure_buckets()?;

    let engine_version = match ctx.engine.version() {
        Ok(version) => {
            tracing::info!(version = %version, "Analysis engine reachable");
            Some(version)
        }
        Err(err) => {
            tracing::warn!(error = %err, "Analysis engine not reachable");
            None
        }
    };

    Ok(InitReport {
        buckets_created,
        engine_version,
    })
}
