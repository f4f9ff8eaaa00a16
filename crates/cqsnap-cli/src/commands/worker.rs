//! `build` and `analyze` workers

use clap::Args;
use cqsnap_core::SnapError;
use cqsnap_engine::commands::{analyze, build};
use cqsnap_engine::{BuildStrategy, SnapshotContext};
use cqsnap_store::ClaimFilter;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Claim this snapshot, waiting for the store lock
    #[arg(short = 's', long = "snapshot-global-id")]
    pub global_id: Option<String>,

    /// Claim a failed snapshot instead of a pending one
    #[arg(short, long)]
    pub retry: bool,

    /// Only claim snapshots with this label
    #[arg(short, long)]
    pub label: Option<String>,
}

impl WorkerArgs {
    fn filter(&self) -> ClaimFilter {
        ClaimFilter {
            global_id: self.global_id.clone(),
            label: self.label.clone(),
            retry: self.retry,
        }
    }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub worker: WorkerArgs,

    /// Build command passed to the engine
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// Executable run as `<exec> <language> <source-root> <database>`
    #[arg(short = 'x', long = "exec")]
    pub exec: Option<PathBuf>,
}

pub fn execute_build(ctx: &mut SnapshotContext, args: BuildArgs) -> Result<String, SnapError> {
    let strategy = BuildStrategy::from_options(args.command, args.exec)?;
    let report = build(ctx, &args.worker.filter(), &strategy)?;
    Ok(report.to_string())
}

pub fn execute_analyze(ctx: &mut SnapshotContext, args: WorkerArgs) -> Result<String, SnapError> {
    let report = analyze(ctx, &args.filter())?;
    Ok(report.to_string())
}
