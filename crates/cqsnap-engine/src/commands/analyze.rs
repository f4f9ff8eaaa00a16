//! Analyze stage
//!
//! Runs the analysis over a stored database bundle and stores the SARIF
//! results under the snapshot's global id. A snapshot whose database bundle
//! is missing is sent back to `NOT_BUILT` without running the engine.

use crate::commands::stage::{run_stage, scratch_dir, StageReport};
use crate::context::SnapshotContext;
use cqsnap_core::{log_op_end, log_op_error, log_op_start, Outcome, Snapshot, Stage};
use cqsnap_store::{ClaimFilter, Namespace, Result};
use std::time::Instant;

/// Claim one snapshot and analyze its database
pub fn analyze(ctx: &mut SnapshotContext, filter: &ClaimFilter) -> Result<StageReport> {
    log_op_start!("analyze", retry = filter.retry);
    let start = Instant::now();

    let report = run_stage(ctx, Stage::Analyze, filter, execute_analyze).map_err(|e| {
        log_op_error!("analyze", &e, duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "analyze",
        duration_ms = start.elapsed().as_millis() as u64,
        outcome = %report
    );
    Ok(report)
}

fn execute_analyze(ctx: &SnapshotContext, snapshot: &Snapshot) -> Result<Outcome> {
    let artifacts = ctx.artifacts();
    let global_id = snapshot.global_id();

    if !artifacts.exists(Namespace::Database, global_id)? {
        tracing::warn!(global_id, "Database artifact missing, snapshot needs a rebuild");
        return Ok(Outcome::PrerequisiteMissing);
    }

    let scratch = scratch_dir("cqsnap-analyze-")?;
    let bundle = scratch.path().join(format!("{}.zip", global_id));
    artifacts.get(Namespace::Database, global_id, &bundle)?;

    let database = ctx
        .engine()
        .database_unbundle(&bundle, scratch.path(), global_id)?;
    let sarif = scratch.path().join(format!("{}.sarif", global_id));
    ctx.engine().database_analyze(&database, &sarif)?;

    artifacts.put(Namespace::Sarif, global_id, &sarif)?;
    tracing::info!(global_id, "Stored analysis results");
    Ok(Outcome::Succeeded)
}
