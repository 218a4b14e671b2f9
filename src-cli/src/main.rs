mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::extract::ExtractArgs;
use commands::run::RunArgs;
use commands::runs::RunsArgs;
use commands::Workspace;
use logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "matchday",
    version,
    about = "Extract football match data and build quality-gated statistics tables"
)]
struct Cli {
    /// Settings YAML (default: <root>/config/env.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "PATH", env = "MATCHDAY_CONFIG")]
    config: Option<PathBuf>,

    /// Project root that relative data paths resolve against
    #[arg(long, global = true, value_name = "PATH", default_value = ".")]
    root: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a window of the pipeline and record it in the run ledger
    Run(RunArgs),
    /// Extract raw data for one competition season (no ledger row)
    Extract(ExtractArgs),
    /// Show recent runs and the latest-success pointer
    Runs(RunsArgs),
    /// Show extraction progress per competition season
    Progress,
    /// List the build-step chain
    Steps,
}

fn dispatch(cli: Cli) -> Result<i32> {
    if let Commands::Steps = cli.command {
        return Ok(commands::steps::run_steps());
    }

    let workspace = Workspace::load(&cli.root, cli.config.as_deref())?;
    match &cli.command {
        Commands::Run(args) => commands::run::run_pipeline(&workspace, args),
        Commands::Extract(args) => commands::extract::run_extract(&workspace, args),
        Commands::Runs(args) => commands::runs::run_runs(&workspace, args),
        Commands::Progress => commands::progress::run_progress(&workspace),
        Commands::Steps => Ok(commands::steps::run_steps()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(LogConfig {
        verbose: cli.verbose,
        json: cli.log_json,
    }) {
        eprintln!("warning: {:#}", e);
    }

    match dispatch(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_window() {
        let cli = Cli::try_parse_from([
            "matchday",
            "--root",
            "/srv/md",
            "run",
            "--from-step",
            "00",
            "--to-step",
            "02",
            "--no-fail-fast",
        ])
        .unwrap();
        assert_eq!(cli.root, PathBuf::from("/srv/md"));
        match cli.command {
            Commands::Run(args) => {
                let request = args.to_request();
                assert_eq!(request.from_step.as_deref(), Some("00"));
                assert!(!request.fail_fast);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_season_requires_competition() {
        assert!(Cli::try_parse_from(["matchday", "run", "--season", "2024-25"]).is_err());
        assert!(Cli::try_parse_from(["matchday", "run", "--rebuild-all", "--force"]).is_err());
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from(["matchday", "extract", "ligue-1", "2024-25", "--limit", "5"])
            .unwrap();
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.competition, "ligue-1");
                assert_eq!(args.limit, Some(5));
                assert!(!args.force);
            }
            _ => panic!("expected extract"),
        }
    }
}
