//! Run Ledger: append-only history of orchestrator runs plus the
//! latest-success pointer.
//!
//! A run row is inserted as `running` by [`RunLedger::start_run`] and moved to
//! a terminal status exactly once by [`RunLedger::end_run`]. Readers therefore
//! only ever see `running` or a finished row.

pub mod pointer;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::db::{run_repo, timestamp_now, Database};

pub use pointer::{ArtifactRef, LatestSuccessPointer};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Invalid latest-success pointer '{path}': {source}")]
    Pointer {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Run {0} does not exist")]
    UnknownRun(i64),

    #[error("Run {0} has already finished")]
    AlreadyFinished(i64),

    #[error("Unknown run status '{0}'")]
    InvalidStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Ok,
    /// Only warnings; artifacts are still promoted.
    PartialFail,
    Fail,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Ok => "ok",
            RunStatus::PartialFail => "partial_fail",
            RunStatus::Fail => "fail",
        }
    }

    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        match value {
            "running" => Ok(RunStatus::Running),
            "ok" => Ok(RunStatus::Ok),
            "partial_fail" => Ok(RunStatus::PartialFail),
            "fail" => Ok(RunStatus::Fail),
            other => Err(LedgerError::InvalidStatus(other.to_string())),
        }
    }

    pub fn is_promotable(self) -> bool {
        matches!(self, RunStatus::Ok | RunStatus::PartialFail)
    }

    /// Process exit code for a finished run. 2 is left to argument errors.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::Fail | RunStatus::Running => 1,
            RunStatus::PartialFail => 3,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger row with decoded step lists.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub run_id: i64,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub steps_planned: Vec<String>,
    pub steps_run: Vec<String>,
    pub status: RunStatus,
    pub failed_step: Option<String>,
    pub env: String,
}

impl PipelineRun {
    fn from_row(row: run_repo::RunRow) -> Result<Self, LedgerError> {
        Ok(Self {
            run_id: row.run_id,
            started_at: row.started_at,
            ended_at: row.ended_at,
            steps_planned: decode_steps(&row.steps_planned),
            steps_run: row.steps_run.as_deref().map(decode_steps).unwrap_or_default(),
            status: RunStatus::parse(&row.status)?,
            failed_step: row.failed_step,
            env: row.env,
        })
    }
}

fn encode_steps(steps: &[String]) -> String {
    serde_json::to_string(steps).unwrap_or_else(|_| "[]".to_string())
}

fn decode_steps(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Terminal state handed to [`RunLedger::end_run`].
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub failed_step: Option<String>,
    pub steps_run: Vec<String>,
    pub artifacts: BTreeMap<String, ArtifactRef>,
    /// Both the quality gate and validation evaluated this run's data.
    /// Ungated runs are recorded but never promoted.
    pub gated: bool,
}

#[derive(Clone)]
pub struct RunLedger {
    db: Database,
    pointer_path: PathBuf,
}

impl RunLedger {
    pub fn new(db: Database, pointer_path: &Path) -> Self {
        Self {
            db,
            pointer_path: pointer_path.to_path_buf(),
        }
    }

    pub fn pointer_path(&self) -> &Path {
        &self.pointer_path
    }

    pub fn start_run(&self, steps_planned: &[String], env: &str) -> Result<i64, LedgerError> {
        let run_id =
            run_repo::insert_running(&self.db, &timestamp_now(), &encode_steps(steps_planned), env)?;
        info!(run_id, env, "Run recorded as running");
        Ok(run_id)
    }

    /// Finishes the run and, for gated runs with a promotable status, replaces
    /// the pointer.
    /// Returns whether the pointer now names this run.
    pub fn end_run(&self, run_id: i64, completion: &RunCompletion) -> Result<bool, LedgerError> {
        let ended_at = timestamp_now();
        let changed = run_repo::finish(
            &self.db,
            run_id,
            &ended_at,
            &encode_steps(&completion.steps_run),
            completion.status.as_str(),
            completion.failed_step.as_deref(),
        )?;
        if changed == 0 {
            return match run_repo::find_by_id(&self.db, run_id)? {
                Some(_) => Err(LedgerError::AlreadyFinished(run_id)),
                None => Err(LedgerError::UnknownRun(run_id)),
            };
        }

        if !completion.status.is_promotable() {
            info!(run_id, status = %completion.status, "Run finished; pointer unchanged");
            return Ok(false);
        }
        if !completion.gated {
            info!(run_id, status = %completion.status, "Run finished without both gates; pointer unchanged");
            return Ok(false);
        }

        let env = run_repo::find_by_id(&self.db, run_id)?
            .map(|r| r.env)
            .unwrap_or_default();
        let pointer = LatestSuccessPointer {
            run_id,
            ended_at,
            status: completion.status.as_str().to_string(),
            steps_run: completion.steps_run.clone(),
            env,
            artifacts: completion.artifacts.clone(),
        };
        let promoted = pointer.promote(&self.pointer_path)?;
        info!(run_id, status = %completion.status, promoted, "Run finished");
        Ok(promoted)
    }

    pub fn latest_success(&self) -> Result<Option<LatestSuccessPointer>, LedgerError> {
        LatestSuccessPointer::read(&self.pointer_path)
    }

    /// Newest first.
    pub fn recent_runs(&self, limit: u32) -> Result<Vec<PipelineRun>, LedgerError> {
        run_repo::list_recent(&self.db, limit)?
            .into_iter()
            .map(PipelineRun::from_row)
            .collect()
    }

    pub fn find_run(&self, run_id: i64) -> Result<Option<PipelineRun>, LedgerError> {
        run_repo::find_by_id(&self.db, run_id)?
            .map(PipelineRun::from_row)
            .transpose()
    }
}
