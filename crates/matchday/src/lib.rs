pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod index;
pub mod ledger;
pub mod pipeline;
pub mod quality;
pub mod storage;
pub mod validation;

pub use config::{load_settings, resolve_settings, DataLayout, Settings};
pub use db::Database;
pub use error::{ConfigError, MatchdayError, Result, StorageError};
pub use extraction::{ExtractionEngine, ExtractionOptions, HttpMatchSource, MatchSource};
pub use index::{MatchIndex, MatchRecord, Scope};
pub use ledger::{LatestSuccessPointer, RunLedger, RunStatus};
pub use pipeline::{Orchestrator, PipelineConfig, RunRequest, RunSummary};
pub use quality::{DqCheckResult, DqRegistry, GateReport, Severity};
