use std::path::PathBuf;

use thiserror::Error;

use super::artifact::Artifact;
use super::lock::LockError;

/// Errors that prevent a run from being carried out at all.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Invalid step window: '{from}' comes after '{to}'")]
    InvalidWindow { from: String, to: String },

    #[error("Invalid step chain: {0}")]
    InvalidChain(String),

    #[error("Another pipeline run holds the lock at '{0}'")]
    RunLocked(PathBuf),

    #[error("Run lock failed: {0}")]
    Lock(#[from] LockError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Run ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::error::StorageError),
}

/// A failed build step. Recorded on the run, never surfaced as a raw chain.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Outputs of step '{dependency}' are missing: {}", names(.missing))]
    MissingDependency {
        dependency: String,
        missing: Vec<Artifact>,
    },

    #[error("Outputs of step '{dependency}' are out of date: {reason}")]
    StaleDependency { dependency: String, reason: String },

    #[error("Match index unavailable: {0}")]
    Index(#[from] crate::index::IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crate::extraction::ExtractionError),

    #[error("Run ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Upstream degraded: circuit breaker opened for {}", .scopes.join(", "))]
    UpstreamDegraded { scopes: Vec<String> },

    #[error("Run interrupted")]
    Interrupted,
}

fn names(artifacts: &[Artifact]) -> String {
    artifacts
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Standard wording for rerun hints.
pub fn rerun_hint(from: &str, to: &str) -> String {
    if from == to {
        format!("rerun pipeline from step {}", from)
    } else {
        format!("rerun pipeline from step {} through {}", from, to)
    }
}

impl StepError {
    /// Operator-facing remediation for a failure of `step`.
    pub fn remediation(&self, step: &str) -> String {
        match self {
            StepError::MissingDependency { dependency, .. }
            | StepError::StaleDependency { dependency, .. } => rerun_hint(dependency, step),
            StepError::Index(_) => format!(
                "restore the match index (run discovery), then {}",
                rerun_hint(step, step)
            ),
            StepError::UpstreamDegraded { .. } => format!(
                "upstream API looks degraded; wait before retrying, then {}",
                rerun_hint(step, step)
            ),
            StepError::Interrupted => rerun_hint(step, step),
            StepError::Storage(_)
            | StepError::Database(_)
            | StepError::Extraction(_)
            | StepError::Ledger(_) => {
                format!("fix the reported error, then {}", rerun_hint(step, step))
            }
        }
    }
}

/// Non-fatal conditions surfaced at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    ExtractionFailures { scope: String, failed: u32 },
    StepFailedContinuing { step: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::ExtractionFailures { scope, failed } => {
                write!(f, "{} match(es) failed extraction in {}", failed, scope)
            }
            PipelineWarning::StepFailedContinuing { step } => {
                write!(f, "step {} failed; later steps ran on existing outputs", step)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rerun_hint() {
        assert_eq!(rerun_hint("00", "02"), "rerun pipeline from step 00 through 02");
        assert_eq!(rerun_hint("extract", "extract"), "rerun pipeline from step extract");
    }

    #[test]
    fn test_missing_dependency_message_and_hint() {
        let err = StepError::MissingDependency {
            dependency: "derived".to_string(),
            missing: vec![Artifact::PlayerAppearances, Artifact::MatchScores],
        };
        assert_eq!(
            err.to_string(),
            "Outputs of step 'derived' are missing: player_appearances, match_scores"
        );
        assert_eq!(err.remediation("00"), "rerun pipeline from step derived through 00");
    }

    #[test]
    fn test_stale_dependency_hint_starts_at_dependency() {
        let err = StepError::StaleDependency {
            dependency: "derived".to_string(),
            reason: "input match_index is newer than outputs".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Outputs of step 'derived' are out of date: input match_index is newer than outputs"
        );
        assert_eq!(err.remediation("01"), "rerun pipeline from step derived through 01");
    }

    #[test]
    fn test_upstream_degraded_hint_names_extract() {
        let err = StepError::UpstreamDegraded {
            scopes: vec!["pl/2024-25".to_string()],
        };
        assert!(err.remediation("extract").ends_with("rerun pipeline from step extract"));
        assert!(err.to_string().contains("pl/2024-25"));
    }
}
