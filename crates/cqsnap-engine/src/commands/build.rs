//! Build stage
//!
//! Turns a snapshot's source archive into an analysis database bundle.
//!
//! ## Outcomes
//!
//! - source artifact missing: `SNAPSHOT_FAILED`, the engine is never run
//! - database created and bundled: bundle stored as `<global_id>`, `NOT_ANALYZED`
//! - engine failure: any partial database is archived and stored for
//!   postmortem, `BUILD_FAILED`

use crate::commands::stage::{run_stage, scratch_dir, StageReport};
use crate::context::SnapshotContext;
use crate::engine::{run_custom_build, AnalysisEngine, BuildStrategy, EngineError};
use cqsnap_core::{log_op_end, log_op_error, log_op_start, Outcome, Snapshot, SnapshotLanguage, Stage};
use cqsnap_store::archive::{archive_dir, extract_archive, ARCHIVE_SUFFIX};
use cqsnap_store::{ArtifactStore, ClaimFilter, Namespace, Result};
use std::path::Path;
use std::time::Instant;

/// Claim one snapshot and build its database
pub fn build(
    ctx: &mut SnapshotContext,
    filter: &ClaimFilter,
    strategy: &BuildStrategy,
) -> Result<StageReport> {
    log_op_start!("build", retry = filter.retry);
    let start = Instant::now();

    let report = run_stage(ctx, Stage::Build, filter, |ctx, snapshot| {
        execute_build(ctx, snapshot, strategy)
    })
    .map_err(|e| {
        log_op_error!("build", &e, duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "build",
        duration_ms = start.elapsed().as_millis() as u64,
        outcome = %report
    );
    Ok(report)
}

fn execute_build(
    ctx: &SnapshotContext,
    snapshot: &Snapshot,
    strategy: &BuildStrategy,
) -> Result<Outcome> {
    let artifacts = ctx.artifacts();
    let global_id = snapshot.global_id();
    let source_id = snapshot.source_id();

    if !artifacts.exists(Namespace::Source, source_id)? {
        tracing::warn!(global_id, source_id, "Source artifact missing, skipping build");
        return Ok(Outcome::PrerequisiteMissing);
    }

    let scratch = scratch_dir("cqsnap-build-")?;
    let source_archive = scratch
        .path()
        .join(format!("{}{}", source_id, ARCHIVE_SUFFIX));
    artifacts.get(Namespace::Source, source_id, &source_archive)?;
    let source_root = scratch.path().join("source");
    extract_archive(&source_archive, &source_root)?;

    let language = snapshot.language();
    let database = scratch
        .path()
        .join(format!("{}-{}-db", global_id, language.engine_name()));
    let bundle = scratch.path().join(format!("{}.zip", global_id));

    let built = create_database(ctx.engine(), strategy, language, &source_root, &database)
        .and_then(|()| ctx.engine().database_bundle(&database, &bundle));

    match built {
        Ok(()) => {
            artifacts.put(Namespace::Database, global_id, &bundle)?;
            tracing::info!(global_id, "Stored database bundle");
            Ok(Outcome::Succeeded)
        }
        Err(err) => {
            tracing::warn!(global_id, error = %err, "Database build failed");
            if database.is_dir() {
                store_partial_database(artifacts, global_id, &database, scratch.path());
            }
            Ok(Outcome::Failed)
        }
    }
}

fn create_database(
    engine: &dyn AnalysisEngine,
    strategy: &BuildStrategy,
    language: SnapshotLanguage,
    source_root: &Path,
    database: &Path,
) -> std::result::Result<(), EngineError> {
    match strategy {
        BuildStrategy::Default => engine.database_create(language, source_root, database, None),
        BuildStrategy::Command(command) => {
            engine.database_create(language, source_root, database, Some(command.as_str()))
        }
        BuildStrategy::Exec(exec) => run_custom_build(exec, language, source_root, database),
    }
}

/// Keep what the engine left behind; a failure here does not change the outcome
fn store_partial_database(artifacts: &ArtifactStore, global_id: &str, database: &Path, scratch: &Path) {
    let archive = scratch.join(format!("{}-partial{}", global_id, ARCHIVE_SUFFIX));
    let stored = archive_dir(database, &archive)
        .and_then(|()| artifacts.put(Namespace::Database, global_id, &archive));

    match stored {
        Ok(()) => tracing::info!(global_id, "Stored partial database for postmortem"),
        Err(err) => tracing::warn!(
            global_id,
            err_code = err.code(),
            error = %err,
            "Could not store partial database"
        ),
    }
}
