//! Global connection options
//!
//! Every option can also be set through a `CODEQL_SNAPSHOT_*` environment
//! variable; a `.env` file in the working directory is loaded first.

use clap::Args;
use cqsnap_engine::StoreConfig;
use cqsnap_store::BucketNames;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Metadata store, a SQLite path optionally prefixed with sqlite://
    #[arg(
        long,
        global = true,
        env = "CODEQL_SNAPSHOT_CONNECTION_STRING",
        default_value = "sqlite://codeql-snapshot.db"
    )]
    pub connection_string: String,

    /// Directory holding the artifact buckets
    #[arg(
        long,
        global = true,
        env = "CODEQL_SNAPSHOT_STORAGE_ROOT",
        default_value = "codeql-snapshot-objects"
    )]
    pub storage_root: PathBuf,

    #[arg(
        long,
        global = true,
        env = "CODEQL_SNAPSHOT_STORAGE_SOURCE_BUCKET",
        default_value = "sources"
    )]
    pub storage_source_bucket: String,

    #[arg(
        long,
        global = true,
        env = "CODEQL_SNAPSHOT_STORAGE_DATABASE_BUCKET",
        default_value = "databases"
    )]
    pub storage_database_bucket: String,

    #[arg(
        long,
        global = true,
        env = "CODEQL_SNAPSHOT_STORAGE_SARIF_BUCKET",
        default_value = "sarifs"
    )]
    pub storage_sarif_bucket: String,

    /// Seconds to wait for the store lock on explicit-id operations
    #[arg(
        long,
        global = true,
        env = "CODEQL_SNAPSHOT_LOCK_TIMEOUT_SECS",
        default_value_t = 30
    )]
    pub lock_timeout_secs: u64,

    /// CodeQL executable
    #[arg(long, global = true, env = "CODEQL_SNAPSHOT_CODEQL", default_value = "codeql")]
    pub codeql: PathBuf,

    /// "json" for JSON log lines on stderr
    #[arg(long, global = true, env = "CODEQL_SNAPSHOT_LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl StoreArgs {
    pub fn to_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(self.connection_string.clone(), self.storage_root.clone());
        config.buckets = BucketNames {
            source: self.storage_source_bucket.clone(),
            database: self.storage_database_bucket.clone(),
            sarif: self.storage_sarif_bucket.clone(),
        };
        config.lock_timeout = Duration::from_secs(self.lock_timeout_secs);
        config.codeql_path = self.codeql.clone();
        config
    }
}
