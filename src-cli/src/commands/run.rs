use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use matchday::extraction::{HttpMatchSource, ThreadSleeper};
use matchday::pipeline::{LogProgress, Orchestrator, RunRequest, RunSummary, StepStatus};
use matchday::{GateReport, Scope, Severity};

use super::{install_interrupt_handler, Workspace};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// First step of the window (default: extract)
    #[arg(long, value_name = "ID")]
    pub from_step: Option<String>,
    /// Last step of the window (default: validate)
    #[arg(long, value_name = "ID")]
    pub to_step: Option<String>,
    /// Ignore staleness and re-extract matches that already succeeded
    #[arg(long)]
    pub force: bool,
    /// Keep going after a failed step
    #[arg(long)]
    pub no_fail_fast: bool,
    /// Rebuild every step from `derived` through `validate` with --force
    #[arg(long, conflicts_with_all = ["from_step", "to_step", "force"])]
    pub rebuild_all: bool,
    /// Restrict extraction to one competition (requires --season)
    #[arg(long, value_name = "SLUG", requires = "season")]
    pub competition: Option<String>,
    /// Restrict extraction to one season label (requires --competition)
    #[arg(long, value_name = "LABEL", requires = "competition")]
    pub season: Option<String>,
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn to_request(&self) -> RunRequest {
        let mut request = if self.rebuild_all {
            RunRequest::rebuild_all()
        } else {
            RunRequest {
                from_step: self.from_step.clone(),
                to_step: self.to_step.clone(),
                force: self.force,
                ..RunRequest::default()
            }
        };
        request.fail_fast = !self.no_fail_fast;
        request.scope = match (&self.competition, &self.season) {
            (Some(slug), Some(season)) => Some(Scope::new(slug, season)),
            _ => None,
        };
        request
    }
}

pub fn run_pipeline(workspace: &Workspace, args: &RunArgs) -> Result<i32> {
    let request = args.to_request();
    tracing::info!(
        root = %workspace.root.display(),
        env = %workspace.settings.env,
        "Starting pipeline run"
    );
    let db = workspace.open_database()?;
    let cancel = install_interrupt_handler()?;

    let mut source = HttpMatchSource::new(&workspace.config.api_base, workspace.config.request_timeout)
        .context("Failed to build HTTP client")?;
    let orchestrator =
        Orchestrator::new(Arc::new(workspace.config.clone()), db).with_cancel_flag(cancel);

    let summary = orchestrator.run(&request, &mut source, &ThreadSleeper, &LogProgress)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else {
        print_summary(&summary);
    }
    Ok(summary.exit_code())
}

fn summary_json(summary: &RunSummary) -> serde_json::Value {
    json!({
        "run_id": summary.run_id,
        "status": summary.status.as_str(),
        "failed_step": summary.failed_step,
        "steps_run": summary.steps_run,
        "promoted": summary.promoted,
        "remediation": summary.remediation,
        "warnings": summary.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        "dq": summary.dq,
        "validation": summary.validation,
    })
}

fn print_gate(report: &GateReport) {
    println!("{} gate: {}", report.gate, report.verdict());
    for result in report.results.iter().filter(|r| r.severity != Severity::Pass) {
        println!(
            "  {:<4} {}: {}",
            result.severity, result.check_name, result.message
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!("run {}: {}", summary.run_id, summary.status);
    for outcome in &summary.outcomes {
        let line = match &outcome.status {
            StepStatus::Completed { rows } => {
                let rows = rows
                    .iter()
                    .map(|(artifact, n)| format!("{}={}", artifact, n))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("ok       {}", rows)
            }
            StepStatus::Skipped { reason } => format!("skipped  {}", reason),
            StepStatus::Failed { error, .. } => format!("failed   {}", error),
            StepStatus::Evaluated { verdict } => format!("{:<8} gate", verdict.as_str()),
        };
        println!("  {:<9}{}", outcome.step, line);
    }

    for report in summary.dq.iter().chain(summary.validation.iter()) {
        print_gate(report);
    }
    for warning in &summary.warnings {
        println!("warning: {}", warning);
    }
    for hint in &summary.remediation {
        println!("hint: {}", hint);
    }
    if summary.promoted {
        println!("latest-success pointer now names run {}", summary.run_id);
    }
}
