//! Snapshot lifecycle state machine.
//!
//! The pipeline has two stages gated on each other: build turns a source
//! archive into an analysis database, analyze turns the database into
//! results. Both stages share the claim → execute → reconcile protocol; this
//! module holds the per-stage state mapping and the transition graph so the
//! store and command layers never hard-code state pairs.
//!
//! ```text
//! SNAPSHOT_FAILED --retry--> NOT_BUILT
//! NOT_BUILT --claim--> BUILD_IN_PROGRESS --ok--> NOT_ANALYZED
//!                                        --err--> BUILD_FAILED
//!                                        --no source--> SNAPSHOT_FAILED
//! NOT_ANALYZED --claim--> ANALYSIS_IN_PROGRESS --ok--> ANALYZED
//!                                              --err--> ANALYSIS_FAILED
//!                                              --no database--> NOT_BUILT
//! ```

use crate::errors::ModelError;
use crate::model::SnapshotState;
use std::fmt;

/// Pipeline stage run by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Build,
    Analyze,
}

/// Result of the unlocked execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Engine succeeded and the produced artifact was stored
    Succeeded,
    /// Engine, storage or archive failure during execution
    Failed,
    /// The input artifact was absent, execution was never attempted
    PrerequisiteMissing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Analyze => "analyze",
        }
    }

    /// State a row must be in to be claimed for this stage
    pub fn pending_state(&self) -> SnapshotState {
        match self {
            Stage::Build => SnapshotState::NotBuilt,
            Stage::Analyze => SnapshotState::NotAnalyzed,
        }
    }

    /// Terminal failure state a retry claims from
    pub fn failed_state(&self) -> SnapshotState {
        match self {
            Stage::Build => SnapshotState::BuildFailed,
            Stage::Analyze => SnapshotState::AnalysisFailed,
        }
    }

    pub fn in_progress_state(&self) -> SnapshotState {
        match self {
            Stage::Build => SnapshotState::BuildInProgress,
            Stage::Analyze => SnapshotState::AnalysisInProgress,
        }
    }

    /// State selected by a claim; retry never selects in-progress rows
    pub fn claimable_state(&self, retry: bool) -> SnapshotState {
        if retry {
            self.failed_state()
        } else {
            self.pending_state()
        }
    }

    /// Final state written by reconcile
    pub fn outcome_state(&self, outcome: Outcome) -> SnapshotState {
        match (self, outcome) {
            (Stage::Build, Outcome::Succeeded) => SnapshotState::NotAnalyzed,
            (Stage::Build, Outcome::Failed) => SnapshotState::BuildFailed,
            (Stage::Build, Outcome::PrerequisiteMissing) => SnapshotState::SnapshotFailed,
            (Stage::Analyze, Outcome::Succeeded) => SnapshotState::Analyzed,
            (Stage::Analyze, Outcome::Failed) => SnapshotState::AnalysisFailed,
            // Without a database the snapshot has to go through build again
            (Stage::Analyze, Outcome::PrerequisiteMissing) => SnapshotState::NotBuilt,
        }
    }

    /// Stage whose in-progress state this is
    pub fn owning(state: SnapshotState) -> Option<Stage> {
        match state {
            SnapshotState::BuildInProgress => Some(Stage::Build),
            SnapshotState::AnalysisInProgress => Some(Stage::Analyze),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State an operator-driven recovery returns a stuck in-progress row to
pub fn recover_target(state: SnapshotState) -> Option<SnapshotState> {
    Stage::owning(state).map(|stage| stage.pending_state())
}

/// State a re-registration resets a failed snapshot to
///
/// `source_present` reports whether the source archive still exists.
/// Returns `None` for states registration leaves alone.
pub fn registration_reset(state: SnapshotState, source_present: bool) -> Option<SnapshotState> {
    match state {
        SnapshotState::BuildFailed | SnapshotState::SnapshotFailed => Some(SnapshotState::NotBuilt),
        SnapshotState::AnalysisFailed if source_present => Some(SnapshotState::NotAnalyzed),
        SnapshotState::AnalysisFailed => Some(SnapshotState::NotBuilt),
        _ => None,
    }
}

/// Whether `from -> to` is an edge of the lifecycle graph
pub fn can_transition(from: SnapshotState, to: SnapshotState) -> bool {
    use SnapshotState::*;
    matches!(
        (from, to),
        (SnapshotFailed, NotBuilt)
            | (NotBuilt, BuildInProgress)
            | (NotBuilt, SnapshotFailed)
            | (BuildInProgress, NotAnalyzed)
            | (BuildInProgress, BuildFailed)
            | (BuildInProgress, SnapshotFailed)
            | (BuildInProgress, NotBuilt)
            | (BuildFailed, NotBuilt)
            | (BuildFailed, BuildInProgress)
            | (NotAnalyzed, AnalysisInProgress)
            | (AnalysisInProgress, Analyzed)
            | (AnalysisInProgress, AnalysisFailed)
            | (AnalysisInProgress, NotBuilt)
            | (AnalysisInProgress, NotAnalyzed)
            | (AnalysisFailed, NotAnalyzed)
            | (AnalysisFailed, NotBuilt)
            | (AnalysisFailed, AnalysisInProgress)
    )
}

/// Reject transitions outside the lifecycle graph
pub fn check_transition(from: SnapshotState, to: SnapshotState) -> Result<(), ModelError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ModelError::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
