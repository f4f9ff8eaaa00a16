//! `add`: register a source tree

use clap::Args;
use cqsnap_core::{SnapError, SnapshotLanguage};
use cqsnap_engine::commands::{register, RegisterRequest};
use cqsnap_engine::SnapshotContext;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Root of the source tree to snapshot
    pub source_root: PathBuf,

    /// One of cpp, java, javascript, swift, go, csharp, python, ruby
    #[arg(long)]
    pub language: SnapshotLanguage,

    /// Defaults to the url of the git remote 'origin'
    #[arg(long)]
    pub project_url: Option<String>,

    /// Defaults to the current git branch
    #[arg(long)]
    pub branch: Option<String>,

    /// Defaults to the git HEAD commit
    #[arg(long)]
    pub commit: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Work-partition tag for workers
    #[arg(long)]
    pub label: Option<String>,
}

pub fn execute(ctx: &mut SnapshotContext, args: AddArgs) -> Result<String, SnapError> {
    let request = RegisterRequest {
        source_root: args.source_root,
        language: args.language,
        project_url: args.project_url,
        branch: args.branch,
        commit: args.commit,
        category: args.category,
        label: args.label,
    };
    let outcome = register(ctx, &request)?;
    Ok(outcome.to_string())
}
