//! Subcommands of the `matchday` binary.
//!
//! - `run`: orchestrated pipeline run recorded in the run ledger
//! - `extract`: extraction for one competition season
//! - `runs`: recent runs and the latest-success pointer
//! - `progress`: extraction progress per competition season
//! - `steps`: the build-step chain

pub mod extract;
pub mod progress;
pub mod run;
pub mod runs;
pub mod steps;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use matchday::{resolve_settings, Database, PipelineConfig, Settings};

/// Settings and resolved data roots for one invocation.
pub struct Workspace {
    pub root: PathBuf,
    pub settings: Settings,
    pub config: PipelineConfig,
}

impl Workspace {
    pub fn load(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to determine current directory")?
                .join(root)
        };
        let settings = resolve_settings(&root, config_path).context("Failed to load settings")?;
        let config = PipelineConfig::from_settings(&settings, &root);
        tracing::debug!(root = %root.display(), env = %settings.env, "Workspace loaded");

        Ok(Self {
            root,
            settings,
            config,
        })
    }

    pub fn open_database(&self) -> Result<Database> {
        let path = self.config.layout.database_path();
        Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
    }
}

/// Sets the returned flag on Ctrl-C. Work stops at the next match or step boundary.
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            eprintln!("Interrupt already requested; waiting for the current match to finish");
        } else {
            eprintln!("Interrupt received; stopping at the next safe point");
        }
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(flag)
}
