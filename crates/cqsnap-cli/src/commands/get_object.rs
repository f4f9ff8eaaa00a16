use clap::Args;
use cqsnap_core::SnapError;
use cqsnap_engine::commands::{get_object, ObjectKind};
use cqsnap_engine::SnapshotContext;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct GetObjectArgs {
    #[arg(short = 's', long = "snapshot-global-id")]
    pub global_id: String,

    /// database or sarif
    #[arg(short = 't', long = "object-type")]
    pub object_type: ObjectKind,

    /// Existing directory to download into
    pub directory: PathBuf,
}

pub fn execute(ctx: &SnapshotContext, args: GetObjectArgs) -> Result<String, SnapError> {
    let outcome = get_object(ctx, &args.global_id, args.object_type, &args.directory)?;
    Ok(outcome.to_string())
}
