use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::db::progress_repo::{self, ProgressRow};
use crate::db::Database;
use crate::index::Scope;
use crate::storage::table::write_csv;

use super::error::ExtractionError;

/// Terminal state of one extraction run over a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRunStatus {
    /// Every in-scope match is extracted.
    Complete,
    /// At least one match failed, but the run went to the end.
    Partial,
    /// The breaker tripped or the run was interrupted.
    Aborted,
}

impl ExtractionRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionRunStatus::Complete => "complete",
            ExtractionRunStatus::Partial => "partial",
            ExtractionRunStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ExtractionRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run counts for a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionProgress {
    pub scope: Scope,
    pub total: u32,
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub run_status: ExtractionRunStatus,
}

impl ExtractionProgress {
    pub fn new(scope: Scope, total: u32) -> Self {
        Self {
            scope,
            total,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            run_status: ExtractionRunStatus::Complete,
        }
    }

    pub fn to_row(&self, run_id: i64, updated_at: &str) -> ProgressRow {
        ProgressRow {
            competition_slug: self.scope.competition_slug.clone(),
            season: self.scope.season.clone(),
            total: self.total,
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            run_status: self.run_status.as_str().to_string(),
            last_run_id: run_id,
            updated_at: updated_at.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ProgressCsvRecord<'a> {
    competition_slug: &'a str,
    season: &'a str,
    total: u32,
    attempted: u32,
    succeeded: u32,
    failed: u32,
    skipped: u32,
    run_status: &'a str,
    updated_at: &'a str,
}

/// Rewrites the flat-text progress mirror from the canonical table.
pub fn export_progress_csv(db: &Database, path: &Path) -> Result<usize, ExtractionError> {
    let rows = progress_repo::list_all(db)?;
    let records: Vec<ProgressCsvRecord<'_>> = rows
        .iter()
        .map(|r| ProgressCsvRecord {
            competition_slug: &r.competition_slug,
            season: &r.season,
            total: r.total,
            attempted: r.attempted,
            succeeded: r.succeeded,
            failed: r.failed,
            skipped: r.skipped,
            run_status: &r.run_status,
            updated_at: &r.updated_at,
        })
        .collect();

    if records.is_empty() {
        // csv writes no header for zero records; keep the file shape stable.
        crate::storage::write_atomic(
            path,
            b"competition_slug,season,total,attempted,succeeded,failed,skipped,run_status,updated_at\n",
        )?;
        return Ok(0);
    }
    Ok(write_csv(path, &records)?)
}
