//! Git metadata for registration defaults
//!
//! Reads `origin` url, current branch and `HEAD` commit of the repository at
//! a source root. Any failure is a usage error: registration cannot proceed
//! without an identity.

use cqsnap_core::errors::{SnapError, SnapErrorKind};
use cqsnap_store::Result;
use std::path::Path;
use std::process::Command;

/// Identity fields resolved from git
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitMetadata {
    pub project_url: String,
    pub branch: String,
    pub commit: String,
}

/// Which identity fields the caller still needs
#[derive(Debug, Clone, Copy, Default)]
pub struct Wanted {
    pub project_url: bool,
    pub branch: bool,
    pub commit: bool,
}

/// Resolve the wanted fields; fields not wanted are left empty
pub fn resolve(source_root: &Path, wanted: Wanted) -> Result<GitMetadata> {
    let git_dir = source_root.join(".git");
    let mut meta = GitMetadata {
        project_url: String::new(),
        branch: String::new(),
        commit: String::new(),
    };

    if wanted.project_url {
        meta.project_url = git(&git_dir, &["remote", "get-url", "origin"])
            .map_err(|e| hint(e, "cannot resolve project url from git remote 'origin'; pass --project-url"))?;
    }
    if wanted.branch {
        meta.branch = git(&git_dir, &["symbolic-ref", "--short", "HEAD"])
            .map_err(|e| hint(e, "cannot resolve branch from git HEAD; pass --branch"))?;
    }
    if wanted.commit {
        meta.commit = git(&git_dir, &["rev-parse", "HEAD"])
            .map_err(|e| hint(e, "cannot resolve commit from git HEAD; pass --commit"))?;
    }

    Ok(meta)
}

fn git(git_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg(format!("--git-dir={}", git_dir.display()))
        .args(args)
        .output()
        .map_err(|e| usage(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(usage(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        return Err(usage(format!("git {} returned nothing", args.join(" "))));
    }
    Ok(value)
}

fn hint(err: SnapError, message: &str) -> SnapError {
    let detail = err.message().to_string();
    err.with_message(format!("{} ({})", message, detail))
}

fn usage(message: String) -> SnapError {
    SnapError::new(SnapErrorKind::Usage)
        .with_op("resolve_git_metadata")
        .with_message(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_nothing_wanted_needs_no_git() {
        let dir = TempDir::new().unwrap();
        let meta = resolve(dir.path(), Wanted::default()).unwrap();
        assert!(meta.project_url.is_empty());
    }

    #[test]
    fn test_missing_repository_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let wanted = Wanted {
            commit: true,
            ..Wanted::default()
        };
        let err = resolve(dir.path(), wanted).unwrap_err();
        assert_eq!(err.kind(), SnapErrorKind::Usage);
    }
}
