//! Invocation context
//!
//! Built once per invocation from [`StoreConfig`] and passed by `&mut` to
//! every command. Holds the metadata store connection, the artifact gateway
//! and the analysis engine.

use crate::engine::{AnalysisEngine, CodeqlCli};
use cqsnap_core::errors::{SnapError, SnapErrorKind};
use cqsnap_core_types::RequestId;
use cqsnap_store::db::{self, DEFAULT_LOCK_TIMEOUT};
use cqsnap_store::migrations::is_initialized;
use cqsnap_store::{ArtifactStore, BucketNames, FsObjectStore, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// Connection parameters for the metadata and artifact stores
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database path, optionally prefixed with `sqlite://`
    pub connection_string: String,
    /// Directory holding the artifact buckets
    pub storage_root: PathBuf,
    pub buckets: BucketNames,
    /// How long an explicit-id claim, reconcile or delete waits for the lock
    pub lock_timeout: Duration,
    /// Analysis engine executable
    pub codeql_path: PathBuf,
}

impl StoreConfig {
    pub fn new(connection_string: impl Into<String>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            connection_string: connection_string.into(),
            storage_root: storage_root.into(),
            buckets: BucketNames::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            codeql_path: PathBuf::from("codeql"),
        }
    }
}

/// Per-invocation state shared by all commands
pub struct SnapshotContext {
    pub(crate) conn: Connection,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) engine: Box<dyn AnalysisEngine>,
    pub(crate) lock_timeout: Duration,
    request_id: RequestId,
}

impl SnapshotContext {
    /// Open the stores with the given engine
    ///
    /// Does not check initialization; see [`SnapshotContext::ensure_initialized`].
    pub fn open(config: &StoreConfig, engine: Box<dyn AnalysisEngine>) -> Result<Self> {
        let path = db::database_path(&config.connection_string);
        let conn = db::open(path, config.lock_timeout)?;
        let artifacts = ArtifactStore::new(
            Box::new(FsObjectStore::new(config.storage_root.clone())),
            config.buckets.clone(),
        );

        Ok(Self {
            conn,
            artifacts,
            engine,
            lock_timeout: config.lock_timeout,
            request_id: RequestId::new(),
        })
    }

    /// Open the stores with the `codeql` executable from the config
    pub fn open_with_codeql(config: &StoreConfig) -> Result<Self> {
        Self::open(config, Box::new(CodeqlCli::new(config.codeql_path.clone())))
    }

    /// Fail with `NotInitialized` unless migrations and buckets are in place
    pub fn ensure_initialized(&self) -> Result<()> {
        if is_initialized(&self.conn)? && self.artifacts.buckets_ready()? {
            Ok(())
        } else {
            Err(SnapError::new(SnapErrorKind::NotInitialized)
                .with_op("ensure_initialized")
                .with_request_id(self.request_id.clone())
                .with_message("store is not initialized, run `codeql-snapshot init` first"))
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn engine(&self) -> &dyn AnalysisEngine {
        self.engine.as_ref()
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}
