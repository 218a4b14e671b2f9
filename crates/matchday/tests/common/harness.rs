//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` owns a temporary project root laid out like a real data
//! tree (`data/raw`, `data/index`, `data/derived`, `data/processed`), an open
//! state database and a pipeline configuration tuned for tests: no delays,
//! a single attempt per match.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use matchday::extraction::{ExtractionEngine, ExtractionReport};
use matchday::pipeline::{Artifact, NoopProgress};
use matchday::storage::filesystem::modified_time;
use matchday::{
    Database, MatchIndex, MatchRecord, Orchestrator, PipelineConfig, RunLedger, RunRequest,
    RunSummary, Scope, Settings,
};

use super::builders::{NoSleep, ScriptedSource};

pub struct TestHarness {
    /// Project root; removed on drop.
    temp_dir: TempDir,
    pub config: PipelineConfig,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let mut config = PipelineConfig::from_settings(&Settings::default(), temp_dir.path());
        config.env = "test".to_string();
        config.extraction.match_delay = Duration::ZERO;
        config.extraction.retry.max_attempts = 1;
        config.extraction.retry.base = Duration::ZERO;
        config.extraction.retry.cap = Duration::ZERO;

        let db = Database::open(&config.layout.database_path()).expect("Failed to open database");

        Self {
            temp_dir,
            config,
            db,
        }
    }

    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.config.extraction.breaker_threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.extraction.retry.max_attempts = attempts;
        self
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes the Match Index CSV.
    pub fn write_index(&self, records: &[MatchRecord]) {
        let path = &self.config.layout.index_path;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut writer = csv::Writer::from_path(path).expect("Failed to create index");
        for record in records {
            writer.serialize(record).unwrap();
        }
        writer.flush().unwrap();
    }

    pub fn index(&self) -> MatchIndex {
        MatchIndex::load(&self.config.layout.index_path).expect("Failed to load index")
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(Arc::new(self.config.clone()), self.db.clone())
    }

    pub fn ledger(&self) -> RunLedger {
        RunLedger::new(self.db.clone(), &self.config.layout.pointer_path())
    }

    pub fn run(&self, request: &RunRequest, source: &mut ScriptedSource) -> RunSummary {
        self.orchestrator()
            .run(request, source, &NoSleep, &NoopProgress)
            .expect("Run could not be recorded")
    }

    /// Runs the extraction engine directly for one scope, outside any pipeline run.
    pub fn extract(&self, scope: &Scope, source: &mut ScriptedSource, force: bool) -> ExtractionReport {
        let mut options = self.config.extraction.clone();
        options.force = force;
        ExtractionEngine::new(&self.db, &self.config.layout, options)
            .extract_scope(&self.index(), scope, source, &NoSleep)
            .expect("Extraction failed")
    }

    pub fn artifact_path(&self, artifact: Artifact) -> PathBuf {
        artifact.path(&self.config.layout)
    }

    pub fn match_dir(&self, record: &MatchRecord) -> PathBuf {
        self.config.layout.match_dir(record)
    }

    /// Modification times of `artifacts`, in order.
    pub fn mtimes(&self, artifacts: &[Artifact]) -> Vec<Option<SystemTime>> {
        artifacts
            .iter()
            .map(|a| modified_time(&self.artifact_path(*a)))
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
