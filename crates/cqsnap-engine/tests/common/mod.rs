// Shared fixtures: a scripted engine and a temp store
#![allow(dead_code)]

use cqsnap_core::SnapshotLanguage;
use cqsnap_engine::commands::{init, RegisterRequest};
use cqsnap_engine::{AnalysisEngine, EngineError, SnapshotContext, StoreConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PROJECT_URL: &str = "https://example.com/acme/widgets.git";

/// Knobs and call log of a [`FakeEngine`]
#[derive(Default)]
pub struct Script {
    /// Runs once at the start of the next database create
    pub before_create: Option<Box<dyn FnOnce() + Send>>,
    pub fail_create: bool,
    /// Leave a database directory behind when create fails
    pub leave_partial: bool,
    pub fail_analyze: bool,
    pub calls: Vec<String>,
}

/// Scripted analysis engine; clones share one [`Script`]
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub script: Arc<Mutex<Script>>,
}


impl FakeEngine {
    pub fn set(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: &str) {
        self.script.lock().unwrap().calls.push(call.to_string());
    }
}

fn failed(command: &str) -> EngineError {
    EngineError::Failed {
        command: command.to_string(),
        status: "exit status: 2".to_string(),
        stderr: "scripted failure".to_string(),
    }
}

impl AnalysisEngine for FakeEngine {
    fn database_create(
        &self,
        language: SnapshotLanguage,
        source_root: &Path,
        database: &Path,
        command: Option<&str>,
    ) -> Result<(), EngineError> {
        self.record(&format!("create:{}:{}", language.engine_name(), command.unwrap_or("-")));
        let (hook, fail, partial) = {
            let mut script = self.script.lock().unwrap();
            (script.before_create.take(), script.fail_create, script.leave_partial)
        };
        if let Some(hook) = hook {
            hook();
        }
        if fail {
            if partial {
                fs::create_dir_all(database.join("log")).unwrap();
                fs::write(database.join("log/build.log"), b"compiler crashed\n").unwrap();
            }
            return Err(failed("database create"));
        }
        assert!(source_root.join("README.md").is_file(), "source tree not extracted");
        fs::create_dir_all(database).unwrap();
        fs::write(database.join("codeql-database.yml"), language.engine_name()).unwrap();
        Ok(())
    }

    fn database_bundle(&self, database: &Path, output: &Path) -> Result<(), EngineError> {
        self.record("bundle");
        let marker = fs::read(database.join("codeql-database.yml")).unwrap();
        fs::write(output, marker).unwrap();
        Ok(())
    }

    fn database_unbundle(
        &self,
        bundle: &Path,
        target: &Path,
        name: &str,
    ) -> Result<PathBuf, EngineError> {
        self.record("unbundle");
        let database = target.join(name);
        fs::create_dir_all(&database).unwrap();
        fs::copy(bundle, database.join("codeql-database.yml")).unwrap();
        Ok(database)
    }

    fn database_analyze(&self, database: &Path, output: &Path) -> Result<(), EngineError> {
        self.record("analyze");
        if self.script.lock().unwrap().fail_analyze {
            return Err(failed("database analyze"));
        }
        assert!(database.join("codeql-database.yml").is_file());
        fs::write(output, br#"{"version":"2.1.0","runs":[]}"#).unwrap();
        Ok(())
    }

    fn version(&self) -> Result<String, EngineError> {
        Ok("2.15.0".to_string())
    }
}

/// Temp directory holding a metadata store, buckets and source trees
pub struct Fixture {
    pub dir: TempDir,
    pub config: StoreConfig,
    pub engine: FakeEngine,
}


impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(
            format!("sqlite://{}", dir.path().join("meta.db").display()),
            dir.path().join("objects"),
        );
        Self {
            dir,
            config,
            engine: FakeEngine::default(),
        }
    }

    /// New context sharing this fixture's engine script
    pub fn context(&self) -> SnapshotContext {
        SnapshotContext::open(&self.config, Box::new(self.engine.clone())).unwrap()
    }

    /// Initialized store and a context on it
    pub fn initialized() -> (Self, SnapshotContext) {
        let fixture = Self::new();
        let mut ctx = fixture.context();
        init(&mut ctx).unwrap();
        (fixture, ctx)
    }

    /// Write a small source tree under `name`
    pub fn source_tree(&self, name: &str) -> PathBuf {
        let root = self.dir.path().join(name);
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("README.md"), format!("# {}\n", name)).unwrap();
        fs::write(root.join("src/Main.java"), b"class Main {}\n").unwrap();
        root
    }

    /// Registration with every identity field given
    pub fn request(&self, source_root: &Path, commit: &str, language: SnapshotLanguage) -> RegisterRequest {
        RegisterRequest {
            project_url: Some(PROJECT_URL.to_string()),
            branch: Some("main".to_string()),
            commit: Some(commit.to_string()),
            ..RegisterRequest::new(source_root, language)
        }
    }

    /// Path of a stored object; objects are sharded by the first two key characters
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.config
            .storage_root
            .join(bucket)
            .join(&key[..2])
            .join(key)
    }
}
