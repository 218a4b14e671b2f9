use anyhow::{bail, Context, Result};
use clap::Args;

use matchday::extraction::{
    ExtractionEngine, ExtractionReport, ExtractionRunStatus, HttpMatchSource, ThreadSleeper,
};
use matchday::pipeline::lock::{try_lock_exclusive, LockError};
use matchday::{MatchIndex, Scope};

use super::{install_interrupt_handler, Workspace};

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Competition slug as listed in the match index
    pub competition: String,
    /// Season label, e.g. 2024-25
    pub season: String,
    /// Re-attempt matches that already succeeded
    #[arg(long)]
    pub force: bool,
    /// Only consider the first N matches of the season
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Exit code for a finished extraction, aligned with pipeline run codes.
fn exit_code(status: ExtractionRunStatus) -> i32 {
    match status {
        ExtractionRunStatus::Complete => 0,
        ExtractionRunStatus::Aborted => 1,
        ExtractionRunStatus::Partial => 3,
    }
}

pub fn run_extract(workspace: &Workspace, args: &ExtractArgs) -> Result<i32> {
    let layout = &workspace.config.layout;
    let _lock = match try_lock_exclusive(&layout.lock_path()) {
        Ok(guard) => guard,
        Err(LockError::Locked(path)) => {
            bail!("another pipeline run holds the lock at {}", path.display())
        }
        Err(e) => return Err(e).context("Failed to take run lock"),
    };

    let index = MatchIndex::load(&layout.index_path).context("Failed to load match index")?;
    let scope = Scope::new(&args.competition, &args.season);
    if index.in_scope(&scope).is_empty() {
        bail!("no matches for {} in {}", scope, layout.index_path.display());
    }

    let db = workspace.open_database()?;
    let cancel = install_interrupt_handler()?;
    let mut options = workspace.config.extraction.clone();
    options.force = args.force;
    options.limit = args.limit;

    let mut source = HttpMatchSource::new(&workspace.config.api_base, workspace.config.request_timeout)
        .context("Failed to build HTTP client")?;
    let report = ExtractionEngine::new(&db, layout, options)
        .with_cancel_flag(cancel.as_ref())
        .extract_scope(&index, &scope, &mut source, &ThreadSleeper)?;

    print_report(&report);
    Ok(exit_code(report.progress.run_status))
}

fn print_report(report: &ExtractionReport) {
    let progress = &report.progress;
    println!(
        "{}: {} (total {}, attempted {}, succeeded {}, failed {}, skipped {})",
        progress.scope,
        progress.run_status,
        progress.total,
        progress.attempted,
        progress.succeeded,
        progress.failed,
        progress.skipped
    );
    for failure in &report.failures {
        println!(
            "  match {} failed after {} attempt(s): {}",
            failure.match_id, failure.attempts, failure.message
        );
    }
    if report.breaker_tripped {
        println!("circuit breaker opened: upstream looks degraded, remaining matches were skipped");
    }
    if report.interrupted {
        println!("interrupted: rerun the same command to resume");
    }
}
