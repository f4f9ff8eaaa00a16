use cqsnap_core::SnapError;
use cqsnap_engine::commands::init;
use cqsnap_engine::SnapshotContext;

pub fn execute(ctx: &mut SnapshotContext) -> Result<String, SnapError> {
    let report = init(ctx)?;
    Ok(report.to_string())
}
