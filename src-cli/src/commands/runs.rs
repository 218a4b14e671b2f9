use anyhow::Result;
use clap::Args;

use matchday::RunLedger;

use super::Workspace;

#[derive(Args, Debug, Clone)]
pub struct RunsArgs {
    /// Number of runs to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: u32,
}

pub fn run_runs(workspace: &Workspace, args: &RunsArgs) -> Result<i32> {
    let db = workspace.open_database()?;
    let ledger = RunLedger::new(db, &workspace.config.layout.pointer_path());

    let runs = ledger.recent_runs(args.limit)?;
    if runs.is_empty() {
        println!("no runs recorded");
    }
    for run in &runs {
        println!(
            "{:>5}  {:<12}  {}  -> {}  env={}  steps={}{}",
            run.run_id,
            run.status,
            run.started_at,
            run.ended_at.as_deref().unwrap_or("(running)"),
            run.env,
            run.steps_run.join(","),
            run.failed_step
                .as_deref()
                .map(|s| format!("  failed_step={}", s))
                .unwrap_or_default()
        );
    }

    match ledger.latest_success()? {
        Some(pointer) => {
            println!(
                "latest success: run {} ({}, ended {})",
                pointer.run_id, pointer.status, pointer.ended_at
            );
            for (name, artifact) in &pointer.artifacts {
                println!("  {:<24} {:>8} rows  {}", name, artifact.rows, artifact.path);
            }
        }
        None => println!("latest success: none"),
    }
    Ok(0)
}
