//! Snapshot domain model.
//!
//! States and languages are stored by their upper-case names
//! (`NOT_BUILT`, `JAVA`, ...). The engine is given the lower-case language
//! name (`java`).

use crate::digest;
use crate::errors::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotState {
    SnapshotFailed,
    NotBuilt,
    BuildInProgress,
    BuildFailed,
    NotAnalyzed,
    AnalysisFailed,
    AnalysisInProgress,
    Analyzed,
}

impl SnapshotState {
    pub const ALL: [SnapshotState; 8] = [
        SnapshotState::SnapshotFailed,
        SnapshotState::NotBuilt,
        SnapshotState::BuildInProgress,
        SnapshotState::BuildFailed,
        SnapshotState::NotAnalyzed,
        SnapshotState::AnalysisFailed,
        SnapshotState::AnalysisInProgress,
        SnapshotState::Analyzed,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotState::SnapshotFailed => "SNAPSHOT_FAILED",
            SnapshotState::NotBuilt => "NOT_BUILT",
            SnapshotState::BuildInProgress => "BUILD_IN_PROGRESS",
            SnapshotState::BuildFailed => "BUILD_FAILED",
            SnapshotState::NotAnalyzed => "NOT_ANALYZED",
            SnapshotState::AnalysisFailed => "ANALYSIS_FAILED",
            SnapshotState::AnalysisInProgress => "ANALYSIS_IN_PROGRESS",
            SnapshotState::Analyzed => "ANALYZED",
        }
    }

    /// Failed states that a retry may pick up again
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            SnapshotState::SnapshotFailed
                | SnapshotState::BuildFailed
                | SnapshotState::AnalysisFailed
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            SnapshotState::BuildInProgress | SnapshotState::AnalysisInProgress
        )
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapshotState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ModelError::UnknownState {
                value: s.to_string(),
            })
    }
}

/// Source languages the analysis engine can build databases for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapshotLanguage {
    Cpp,
    Java,
    Javascript,
    Swift,
    Go,
    Csharp,
    Python,
    Ruby,
}

impl SnapshotLanguage {
    pub const ALL: [SnapshotLanguage; 8] = [
        SnapshotLanguage::Cpp,
        SnapshotLanguage::Java,
        SnapshotLanguage::Javascript,
        SnapshotLanguage::Swift,
        SnapshotLanguage::Go,
        SnapshotLanguage::Csharp,
        SnapshotLanguage::Python,
        SnapshotLanguage::Ruby,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotLanguage::Cpp => "CPP",
            SnapshotLanguage::Java => "JAVA",
            SnapshotLanguage::Javascript => "JAVASCRIPT",
            SnapshotLanguage::Swift => "SWIFT",
            SnapshotLanguage::Go => "GO",
            SnapshotLanguage::Csharp => "CSHARP",
            SnapshotLanguage::Python => "PYTHON",
            SnapshotLanguage::Ruby => "RUBY",
        }
    }

    /// Name passed to the analysis engine's `--language`
    pub fn engine_name(&self) -> &'static str {
        match self {
            SnapshotLanguage::Cpp => "cpp",
            SnapshotLanguage::Java => "java",
            SnapshotLanguage::Javascript => "javascript",
            SnapshotLanguage::Swift => "swift",
            SnapshotLanguage::Go => "go",
            SnapshotLanguage::Csharp => "csharp",
            SnapshotLanguage::Python => "python",
            SnapshotLanguage::Ruby => "ruby",
        }
    }
}

impl fmt::Display for SnapshotLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts either representation, case-insensitively
impl FromStr for SnapshotLanguage {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SnapshotLanguage::ALL
            .iter()
            .copied()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownLanguage {
                value: s.to_string(),
            })
    }
}

/// Immutable identity of a snapshot
///
/// Fields are only readable; a new identity is needed to describe a
/// different snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotIdentity {
    project_url: String,
    branch: String,
    commit: String,
    language: SnapshotLanguage,
    category: Option<String>,
}

impl SnapshotIdentity {
    /// Build an identity, rejecting empty fields and control characters
    ///
    /// Digest parts are newline-joined, so a field carrying a newline could
    /// make two different tuples hash alike.
    pub fn new(
        project_url: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
        language: SnapshotLanguage,
        category: Option<String>,
    ) -> Result<Self, ModelError> {
        let identity = Self {
            project_url: project_url.into(),
            branch: branch.into(),
            commit: commit.into(),
            language,
            category,
        };
        for (field, value) in [
            ("project_url", &identity.project_url),
            ("branch", &identity.branch),
            ("commit", &identity.commit),
        ] {
            if value.trim().is_empty() {
                return Err(ModelError::EmptyIdentityField { field });
            }
        }
        if identity.category.as_deref().is_some_and(|c| c.is_empty()) {
            return Err(ModelError::EmptyIdentityField { field: "category" });
        }
        for (field, value) in [
            ("project_url", Some(identity.project_url.as_str())),
            ("branch", Some(identity.branch.as_str())),
            ("commit", Some(identity.commit.as_str())),
            ("category", identity.category.as_deref()),
        ] {
            if value.is_some_and(|v| v.chars().any(char::is_control)) {
                return Err(ModelError::ControlCharacter { field });
            }
        }
        Ok(identity)
    }

    pub fn project_url(&self) -> &str {
        &self.project_url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn language(&self) -> SnapshotLanguage {
        self.language
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Digest of the full identity tuple
    pub fn global_id(&self) -> String {
        digest::global_id(
            &self.project_url,
            &self.branch,
            &self.commit,
            self.language.engine_name(),
            self.category.as_deref(),
        )
    }

    /// Digest of the source triple
    pub fn source_id(&self) -> String {
        digest::source_id(&self.project_url, &self.branch, &self.commit)
    }
}

/// A snapshot row as read from the metadata store
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    global_id: String,
    source_id: String,
    identity: SnapshotIdentity,
    state: SnapshotState,
    label: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Rebuild a snapshot from stored columns
    pub fn hydrate(
        global_id: String,
        source_id: String,
        identity: SnapshotIdentity,
        state: SnapshotState,
        label: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            global_id,
            source_id,
            identity,
            state,
            label,
            created_at,
            updated_at,
        }
    }

    pub fn global_id(&self) -> &str {
        &self.global_id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn identity(&self) -> &SnapshotIdentity {
        &self.identity
    }

    pub fn language(&self) -> SnapshotLanguage {
        self.identity.language
    }

    pub fn state(&self) -> SnapshotState {
        self.state
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
