use clap::{Args, ValueEnum};
use cqsnap_core::SnapError;
use cqsnap_engine::commands::{list, render_table};
use cqsnap_engine::SnapshotContext;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = ListFormat::Table)]
    pub format: ListFormat,
}

pub fn execute(ctx: &SnapshotContext, args: ListArgs) -> Result<String, SnapError> {
    let records = list(ctx)?;
    let rendered = match args.format {
        ListFormat::Table => render_table(&records).trim_end().to_string(),
        ListFormat::Json => serde_json::to_string_pretty(&records)?,
    };
    Ok(rendered)
}
