//! codeql-snapshot CLI
//!
//! Registers source trees as snapshots and runs build and analyze workers
//! against a shared metadata store and artifact store.

use clap::{Parser, Subcommand};
use cqsnap_core::logging_facility::{self, Profile};
use cqsnap_core::{SnapError, SnapErrorKind};
use cqsnap_engine::SnapshotContext;

mod commands;
mod config;

#[derive(Debug, Parser)]
#[command(name = "codeql-snapshot")]
#[command(about = "Snapshot, build and analyze source trees with CodeQL", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: config::StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the metadata schema and artifact buckets
    Init,
    /// Register a source tree as a snapshot
    Add(commands::add::AddArgs),
    /// Claim one snapshot and build its database
    Build(commands::worker::BuildArgs),
    /// Claim one snapshot and analyze its database
    Analyze(commands::worker::WorkerArgs),
    /// Return a stuck in-progress snapshot to its pending state
    Recover(commands::admin::RecoverArgs),
    /// Delete a snapshot and the artifacts only it uses
    Delete(commands::admin::DeleteArgs),
    /// Download a database bundle or analysis results
    GetObject(commands::get_object::GetObjectArgs),
    /// List all snapshots
    List(commands::list::ListArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging_facility::init(Profile::from_format(cli.store.log_format.as_deref()));

    if let Err(e) = run(cli) {
        std::process::exit(report_error(&e));
    }
}

fn run(cli: Cli) -> Result<(), SnapError> {
    let config = cli.store.to_config();
    let mut ctx = SnapshotContext::open_with_codeql(&config)?;

    let span = tracing::info_span!("worker", request_id = %ctx.request_id());
    let _guard = span.enter();

    if !matches!(cli.command, Commands::Init) {
        ctx.ensure_initialized()?;
    }

    let line = match cli.command {
        Commands::Init => commands::init::execute(&mut ctx)?,
        Commands::Add(args) => commands::add::execute(&mut ctx, args)?,
        Commands::Build(args) => commands::worker::execute_build(&mut ctx, args)?,
        Commands::Analyze(args) => commands::worker::execute_analyze(&mut ctx, args)?,
        Commands::Recover(args) => commands::admin::execute_recover(&mut ctx, args)?,
        Commands::Delete(args) => commands::admin::execute_delete(&mut ctx, args)?,
        Commands::GetObject(args) => commands::get_object::execute(&ctx, args)?,
        Commands::List(args) => commands::list::execute(&ctx, args)?,
    };
    println!("{}", line);
    Ok(())
}

/// Print the error and pick the exit code
///
/// Caller mistakes and an uninitialized store exit 1; anything else that
/// escapes a command exits 2.
fn report_error(err: &SnapError) -> i32 {
    match err.kind() {
        SnapErrorKind::Usage | SnapErrorKind::InvalidInput | SnapErrorKind::NotInitialized => {
            eprintln!("Error: {}", err.message());
            1
        }
        _ => {
            eprintln!("Error: {}", err);
            2
        }
    }
}
