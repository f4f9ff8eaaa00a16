//! Analysis engine adapter
//!
//! The pipeline drives the engine through [`AnalysisEngine`]. [`CodeqlCli`]
//! runs the `codeql` executable; tests substitute a scripted engine.
//!
//! A non-zero exit or a failure to launch the process is an
//! [`EngineError`]. Subprocesses have no timeout.

use cqsnap_core::errors::{SnapError, SnapErrorKind};
use cqsnap_core::SnapshotLanguage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Failures of the engine or a custom build executable
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from {command}: {reason}")]
    Output { command: String, reason: String },
}

impl From<EngineError> for SnapError {
    fn from(err: EngineError) -> Self {
        SnapError::new(SnapErrorKind::Engine)
            .with_op("engine")
            .with_message(err.to_string())
    }
}

/// How a database is created from a source tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildStrategy {
    /// Engine auto-detects the build
    #[default]
    Default,
    /// Engine runs this build command
    Command(String),
    /// Custom executable invoked as `<exec> <language> <source-root> <database>`
    Exec(PathBuf),
}

impl BuildStrategy {
    /// Pick the strategy from the `--command` and `--exec` options
    ///
    /// The two are mutually exclusive.
    pub fn from_options(command: Option<String>, exec: Option<PathBuf>) -> Result<Self, SnapError> {
        match (command, exec) {
            (Some(_), Some(_)) => Err(SnapError::new(SnapErrorKind::Usage)
                .with_op("build")
                .with_message("a build command and a build executable cannot both be given")),
            (Some(command), None) => Ok(BuildStrategy::Command(command)),
            (None, Some(exec)) => Ok(BuildStrategy::Exec(exec)),
            (None, None) => Ok(BuildStrategy::Default),
        }
    }
}

/// Operations the pipeline needs from the analysis engine
pub trait AnalysisEngine {
    /// Create a database at `database` from `source_root`
    ///
    /// `command` overrides the engine's build detection.
    fn database_create(
        &self,
        language: SnapshotLanguage,
        source_root: &Path,
        database: &Path,
        command: Option<&str>,
    ) -> Result<(), EngineError>;

    /// Bundle `database` into the single file `output`
    fn database_bundle(&self, database: &Path, output: &Path) -> Result<(), EngineError>;

    /// Unbundle `bundle` into `target/<name>`, returning the database path
    fn database_unbundle(
        &self,
        bundle: &Path,
        target: &Path,
        name: &str,
    ) -> Result<PathBuf, EngineError>;

    /// Analyze `database`, writing SARIF results to `output`
    fn database_analyze(&self, database: &Path, output: &Path) -> Result<(), EngineError>;

    /// Engine version string
    fn version(&self) -> Result<String, EngineError>;
}

/// Run a custom build executable
///
/// Exit status zero is success; anything else, including a launch failure,
/// is an engine failure.
pub fn run_custom_build(
    exec: &Path,
    language: SnapshotLanguage,
    source_root: &Path,
    database: &Path,
) -> Result<(), EngineError> {
    let mut cmd = Command::new(exec);
    cmd.arg(language.engine_name()).arg(source_root).arg(database);
    let output = run(&mut cmd, &exec.display().to_string())?;
    check_status(&exec.display().to_string(), output).map(|_| ())
}

/// `codeql` command line adapter
#[derive(Debug, Clone)]
pub struct CodeqlCli {
    program: PathBuf,
}

#[derive(Deserialize)]
struct VersionInfo {
    version: String,
}

impl Default for CodeqlCli {
    fn default() -> Self {
        Self::new("codeql")
    }
}

impl CodeqlCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn exec(&self, args: &[String]) -> Result<Output, EngineError> {
        let command = format!("{} {}", self.program.display(), args.join(" "));
        tracing::debug!(command = %command, "Running engine");
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        let output = run(&mut cmd, &self.program.display().to_string())?;
        check_status(&command, output)
    }
}

impl AnalysisEngine for CodeqlCli {
    fn database_create(
        &self,
        language: SnapshotLanguage,
        source_root: &Path,
        database: &Path,
        command: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut args = vec![
            "database".to_string(),
            "create".to_string(),
            format!("--language={}", language.engine_name()),
            format!("--source-root={}", source_root.display()),
        ];
        if let Some(command) = command {
            args.push(format!("--command={}", command));
        }
        args.push(database.display().to_string());
        self.exec(&args).map(|_| ())
    }

    fn database_bundle(&self, database: &Path, output: &Path) -> Result<(), EngineError> {
        self.exec(&[
            "database".to_string(),
            "bundle".to_string(),
            format!("--output={}", output.display()),
            "--mode=brutal".to_string(),
            database.display().to_string(),
        ])
        .map(|_| ())
    }

    fn database_unbundle(
        &self,
        bundle: &Path,
        target: &Path,
        name: &str,
    ) -> Result<PathBuf, EngineError> {
        self.exec(&[
            "database".to_string(),
            "unbundle".to_string(),
            format!("--name={}", name),
            format!("--target={}", target.display()),
            "--".to_string(),
            bundle.display().to_string(),
        ])?;
        Ok(target.join(name))
    }

    fn database_analyze(&self, database: &Path, output: &Path) -> Result<(), EngineError> {
        self.exec(&[
            "database".to_string(),
            "analyze".to_string(),
            "--format=sarifv2.1.0".to_string(),
            format!("--output={}", output.display()),
            "--sarif-add-file-contents".to_string(),
            database.display().to_string(),
        ])
        .map(|_| ())
    }

    fn version(&self) -> Result<String, EngineError> {
        let output = self.exec(&["version".to_string(), "--format=json".to_string()])?;
        let info: VersionInfo =
            serde_json::from_slice(&output.stdout).map_err(|e| EngineError::Output {
                command: "version".to_string(),
                reason: e.to_string(),
            })?;
        Ok(info.version)
    }
}

fn run(cmd: &mut Command, program: &str) -> Result<Output, EngineError> {
    cmd.output().map_err(|source| EngineError::Launch {
        program: program.to_string(),
        source,
    })
}

fn check_status(command: &str, output: Output) -> Result<Output, EngineError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(EngineError::Failed {
            command: command.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_failure_is_engine_error() {
        let cli = CodeqlCli::new("/nonexistent/codeql-binary");
        let err = cli.version().unwrap_err();
        assert!(matches!(err, EngineError::Launch { .. }));

        let snap: SnapError = err.into();
        assert_eq!(snap.kind(), SnapErrorKind::Engine);
    }

    #[test]
    fn test_strategy_options_are_exclusive() {
        assert_eq!(
            BuildStrategy::from_options(None, None).unwrap(),
            BuildStrategy::Default
        );
        assert_eq!(
            BuildStrategy::from_options(Some("make".into()), None).unwrap(),
            BuildStrategy::Command("make".into())
        );
        let err = BuildStrategy::from_options(Some("make".into()), Some("build.sh".into()))
            .unwrap_err();
        assert_eq!(err.kind(), SnapErrorKind::Usage);
    }

    #[test]
    fn test_custom_build_launch_failure() {
        let err = run_custom_build(
            Path::new("/nonexistent/build.sh"),
            SnapshotLanguage::Java,
            Path::new("/tmp/src"),
            Path::new("/tmp/db"),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Launch { .. }));
    }
}
