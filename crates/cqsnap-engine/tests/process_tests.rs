// Subprocess adapters driven by shell scripts

#![cfg(unix)]

mod common;

use common::Fixture;
use cqsnap_core::SnapshotLanguage;
use cqsnap_engine::commands::{build, register};
use cqsnap_engine::{AnalysisEngine, BuildStrategy, CodeqlCli, EngineError};
use cqsnap_store::{ClaimFilter, Namespace};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_codeql_version_is_parsed_from_json() {
    let fx = Fixture::new();
    let codeql = script(
        fx.dir.path(),
        "codeql",
        r#"echo '{"productName":"CodeQL","version":"2.15.3"}'"#,
    );

    let version = CodeqlCli::new(codeql).version().unwrap();
    assert_eq!(version, "2.15.3");
}

#[test]
fn test_codeql_non_zero_exit_carries_stderr() {
    let fx = Fixture::new();
    let codeql = script(fx.dir.path(), "codeql", "echo 'no such database' >&2\nexit 2");

    let err = CodeqlCli::new(codeql)
        .database_analyze(Path::new("/tmp/db"), Path::new("/tmp/out.sarif"))
        .unwrap_err();

    match err {
        EngineError::Failed { stderr, .. } => assert_eq!(stderr, "no such database"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_codeql_receives_bundle_arguments() {
    let fx = Fixture::new();
    let args_log = fx.dir.path().join("args.txt");
    let codeql = script(
        fx.dir.path(),
        "codeql",
        &format!("echo \"$@\" > {}", args_log.display()),
    );

    CodeqlCli::new(codeql)
        .database_bundle(Path::new("/work/db"), Path::new("/work/db.zip"))
        .unwrap();

    let args = fs::read_to_string(&args_log).unwrap();
    assert_eq!(
        args.trim(),
        "database bundle --output=/work/db.zip --mode=brutal /work/db"
    );
}

#[test]
fn test_custom_build_executable_creates_database() {
    let (fx, mut ctx) = Fixture::initialized();
    let root = fx.source_tree("widgets");
    let id = register(&mut ctx, &fx.request(&root, "c1", SnapshotLanguage::Java))
        .unwrap()
        .global_id()
        .to_string();
    let exec = script(
        fx.dir.path(),
        "build.sh",
        "test \"$1\" = java || exit 9\ntest -f \"$2/README.md\" || exit 8\nmkdir -p \"$3\" && printf custom > \"$3/codeql-database.yml\"",
    );

    let report = build(&mut ctx, &ClaimFilter::default(), &BuildStrategy::Exec(exec)).unwrap();

    assert_eq!(report.state(), Some(cqsnap_core::SnapshotState::NotAnalyzed));
    assert!(ctx.artifacts().exists(Namespace::Database, &id).unwrap());
    assert_eq!(fx.engine.calls(), vec!["bundle"]);
}

#[test]
fn test_custom_build_executable_failure_fails_build() {
    let (fx, mut ctx) = Fixture::initialized();
    let root = fx.source_tree("widgets");
    let id = register(&mut ctx, &fx.request(&root, "c1", SnapshotLanguage::Java))
        .unwrap()
        .global_id()
        .to_string();
    let exec = script(
        fx.dir.path(),
        "build.sh",
        "mkdir -p \"$3\" && echo partial > \"$3/trap.log\"\necho 'compilation failed' >&2\nexit 3",
    );

    let report = build(&mut ctx, &ClaimFilter::default(), &BuildStrategy::Exec(exec)).unwrap();

    assert_eq!(report.state(), Some(cqsnap_core::SnapshotState::BuildFailed));
    // The partial database is kept for postmortem
    assert!(ctx.artifacts().exists(Namespace::Database, &id).unwrap());
}

#[test]
fn test_custom_build_launch_failure_fails_build() {
    let (fx, mut ctx) = Fixture::initialized();
    let root = fx.source_tree("widgets");
    register(&mut ctx, &fx.request(&root, "c1", SnapshotLanguage::Java)).unwrap();

    let exec = fx.dir.path().join("does-not-exist.sh");
    let report = build(&mut ctx, &ClaimFilter::default(), &BuildStrategy::Exec(exec)).unwrap();

    assert_eq!(report.state(), Some(cqsnap_core::SnapshotState::BuildFailed));
}
