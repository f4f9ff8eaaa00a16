//! `recover` and `delete`

use clap::Args;
use cqsnap_core::SnapError;
use cqsnap_engine::commands::{delete, recover};
use cqsnap_engine::SnapshotContext;

#[derive(Debug, Args)]
pub struct RecoverArgs {
    #[arg(short = 's', long = "snapshot-global-id")]
    pub global_id: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(short = 's', long = "snapshot-global-id")]
    pub global_id: String,
}

pub fn execute_recover(ctx: &mut SnapshotContext, args: RecoverArgs) -> Result<String, SnapError> {
    Ok(recover(ctx, &args.global_id)?.to_string())
}

pub fn execute_delete(ctx: &mut SnapshotContext, args: DeleteArgs) -> Result<String, SnapError> {
    Ok(delete(ctx, &args.global_id)?.to_string())
}
