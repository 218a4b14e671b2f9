use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{info, info_span, warn};

use crate::db::{check_repo, timestamp_now, Database};
use crate::extraction::{ExtractionEngine, MatchSource, Sleeper};
use crate::index::{MatchIndex, Scope};
use crate::ledger::{ArtifactRef, RunCompletion, RunLedger};
use crate::quality::{self, CheckContext, DqRegistry, GateReport};
use crate::storage::table::count_rows;
use crate::validation::Validator;

use super::artifact::Artifact;
use super::config::PipelineConfig;
use super::context::{RunContext, RunSummary};
use super::error::{PipelineError, PipelineWarning, StepError};
use super::lock::{self, LockError};
use super::progress::{ProgressEvent, ProgressReporter};
use super::staleness::{self, Freshness};
use super::step::{StepChain, StepDescriptor, StepKind};
use super::transforms::{TransformContext, TransformOutput};

/// Control parameters of one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub from_step: Option<String>,
    pub to_step: Option<String>,
    pub force: bool,
    pub fail_fast: bool,
    /// Restrict extraction to one competition season.
    pub scope: Option<Scope>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            from_step: None,
            to_step: None,
            force: false,
            fail_fast: true,
            scope: None,
        }
    }
}

impl RunRequest {
    /// Every build step and both gates, ignoring staleness. Extraction is left out.
    pub fn rebuild_all() -> Self {
        Self {
            from_step: Some("derived".to_string()),
            force: true,
            ..Self::default()
        }
    }
}

/// Walks a window of the step chain for one run and records it in the ledger.
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    db: Database,
    chain: StepChain,
    registry: DqRegistry,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: Arc<PipelineConfig>, db: Database) -> Self {
        Self {
            config,
            db,
            chain: StepChain::standard(),
            registry: DqRegistry::standard(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_registry(mut self, registry: DqRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Stops the run between steps, and extraction between matches, once set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn chain(&self) -> &StepChain {
        &self.chain
    }

    pub fn ledger(&self) -> RunLedger {
        RunLedger::new(self.db.clone(), &self.config.layout.pointer_path())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Runs the requested window. Step failures and gate findings end up in
    /// the summary and the ledger; only problems that prevent a run from
    /// being recorded are returned as errors.
    pub fn run(
        &self,
        request: &RunRequest,
        source: &mut dyn MatchSource,
        sleeper: &dyn Sleeper,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError> {
        let window = self
            .chain
            .window(request.from_step.as_deref(), request.to_step.as_deref())?;

        let _lock = lock::try_lock_exclusive(&self.config.layout.lock_path()).map_err(|e| match e {
            LockError::Locked(path) => PipelineError::RunLocked(path),
            other => PipelineError::Lock(other),
        })?;

        let ledger = self.ledger();
        let planned: Vec<String> = window.iter().map(|s| s.id.to_string()).collect();
        let run_id = ledger.start_run(&planned, &self.config.env)?;

        let _pipeline_span = info_span!("pipeline",
            run_id,
            env = %self.config.env,
            force = request.force,
        )
        .entered();
        progress.report(ProgressEvent::RunStarted {
            run_id,
            steps: planned.clone(),
        });

        let mut ctx = RunContext::new(run_id);
        match MatchIndex::load(&self.config.layout.index_path) {
            Ok(index) => self.run_window(&mut ctx, window, &index, request, source, sleeper, progress),
            Err(e) => ctx.record_failure(window[0].id, &StepError::Index(e), progress),
        }

        let status = ctx.status();
        let artifacts = if status.is_promotable() {
            self.published_artifacts()
        } else {
            BTreeMap::new()
        };
        let promoted = ledger.end_run(
            run_id,
            &RunCompletion {
                status,
                failed_step: ctx.failed_step.clone(),
                steps_run: ctx.steps_run.clone(),
                artifacts,
                gated: ctx.gated(),
            },
        )?;

        progress.report(ProgressEvent::RunFinished {
            run_id,
            status: status.to_string(),
        });
        Ok(ctx.into_summary(status, promoted))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_window(
        &self,
        ctx: &mut RunContext,
        window: &[StepDescriptor],
        index: &MatchIndex,
        request: &RunRequest,
        source: &mut dyn MatchSource,
        sleeper: &dyn Sleeper,
        progress: &dyn ProgressReporter,
    ) {
        for step in window {
            if self.cancelled() {
                warn!(step = step.id, "Run interrupted before step");
                ctx.record_failure(step.id, &StepError::Interrupted, progress);
                break;
            }

            let _step_span = info_span!("step", id = step.id).entered();

            if let Some(reason) = self.skip_reason(step, request.force) {
                match reason {
                    Ok(reason) => {
                        ctx.record_skipped(step.id, reason, progress);
                        continue;
                    }
                    Err(e) => {
                        ctx.record_failure(step.id, &e, progress);
                        if request.fail_fast {
                            break;
                        }
                        ctx.warnings.push(PipelineWarning::StepFailedContinuing {
                            step: step.id.to_string(),
                        });
                        continue;
                    }
                }
            }

            progress.report(ProgressEvent::StepStarted {
                step: step.id.to_string(),
                label: step.label.to_string(),
            });

            let outcome = match step.kind {
                StepKind::Extract => self
                    .step_extract(ctx, index, request, source, sleeper)
                    .map(Executed::Built),
                StepKind::Transform(transform) => transform(&TransformContext {
                    layout: &self.config.layout,
                    index,
                })
                .map(Executed::Built),
                StepKind::QualityGate => self.step_quality_gate(ctx.run_id, index).map(Executed::Gate),
                StepKind::Validation => self.step_validation(ctx.run_id).map(Executed::Gate),
            };

            match outcome {
                Ok(Executed::Built(rows)) => ctx.record_completed(step.id, rows, progress),
                Ok(Executed::Gate(report)) => ctx.record_gate(step.id, report, progress),
                Err(e) => {
                    ctx.record_failure(step.id, &e, progress);
                    if request.fail_fast {
                        info!(step = step.id, "Stopping window after failed step");
                        break;
                    }
                    ctx.warnings.push(PipelineWarning::StepFailedContinuing {
                        step: step.id.to_string(),
                    });
                }
            }
        }
    }

    /// `Some(Ok(reason))` when the step can be skipped, `Some(Err(_))` when it
    /// cannot run, `None` when it should run.
    fn skip_reason(
        &self,
        step: &StepDescriptor,
        force: bool,
    ) -> Option<Result<String, StepError>> {
        if force || step.kind.is_gate() {
            return None;
        }

        let layout = &self.config.layout;
        if let Some(dependency) = self.chain.predecessor(step.id) {
            let missing: Vec<Artifact> = dependency
                .writes
                .iter()
                .copied()
                .filter(|a| !a.exists(layout))
                .collect();
            if !missing.is_empty() {
                return Some(Err(StepError::MissingDependency {
                    dependency: dependency.id.to_string(),
                    missing,
                }));
            }

            // Raw matches are judged per match by extraction outcomes.
            if !matches!(dependency.kind, StepKind::Extract) {
                match staleness::check(layout, dependency) {
                    Ok(Freshness::Fresh) => {}
                    Ok(Freshness::Stale(reason)) => {
                        return Some(Err(StepError::StaleDependency {
                            dependency: dependency.id.to_string(),
                            reason,
                        }));
                    }
                    Err(e) => return Some(Err(e.into())),
                }
            }
        }

        // Extraction decides per match from recorded outcomes.
        if matches!(step.kind, StepKind::Extract) {
            return None;
        }

        match staleness::check(layout, step) {
            Ok(Freshness::Fresh) => Some(Ok("outputs are newer than inputs".to_string())),
            Ok(Freshness::Stale(reason)) => {
                tracing::debug!(step = step.id, reason = %reason, "Step is stale");
                None
            }
            Err(e) => Some(Err(e.into())),
        }
    }

    fn step_extract(
        &self,
        ctx: &mut RunContext,
        index: &MatchIndex,
        request: &RunRequest,
        source: &mut dyn MatchSource,
        sleeper: &dyn Sleeper,
    ) -> Result<TransformOutput, StepError> {
        let scopes = match &request.scope {
            Some(scope) => vec![scope.clone()],
            None => index.scopes(),
        };

        let mut options = self.config.extraction.clone();
        options.force = request.force;
        let engine = ExtractionEngine::new(&self.db, &self.config.layout, options)
            .with_cancel_flag(self.cancel.as_ref());

        let mut succeeded = 0usize;
        for scope in scopes {
            let report = engine.extract_scope(index, &scope, source, sleeper)?;
            succeeded += report.progress.succeeded as usize;
            if report.progress.failed > 0 {
                ctx.warnings.push(PipelineWarning::ExtractionFailures {
                    scope: scope.to_string(),
                    failed: report.progress.failed,
                });
            }

            let interrupted = report.interrupted;
            let tripped = report.breaker_tripped;
            ctx.extraction.push(report);

            if interrupted {
                return Err(StepError::Interrupted);
            }
            if tripped {
                return Err(StepError::UpstreamDegraded {
                    scopes: vec![scope.to_string()],
                });
            }
        }

        Ok(vec![(Artifact::RawMatches, succeeded)])
    }

    fn step_quality_gate(&self, run_id: i64, index: &MatchIndex) -> Result<GateReport, StepError> {
        let report = self.registry.run(&CheckContext {
            layout: &self.config.layout,
            index,
            chain: &self.chain,
            now: SystemTime::now(),
            freshness: self.config.freshness,
        });

        check_repo::insert_many(&self.db, &report.to_rows(run_id, &timestamp_now()))?;
        quality::write_report(&self.config.layout.dq_report_path(), run_id, &report)?;
        Ok(report)
    }

    fn step_validation(&self, run_id: i64) -> Result<GateReport, StepError> {
        let previous = self.ledger().latest_success()?;
        let report = Validator::new(
            &self.config.layout,
            &self.chain,
            self.config.max_row_drop_fraction,
        )
        .validate(previous.as_ref());

        check_repo::insert_many(&self.db, &report.to_rows(run_id, &timestamp_now()))?;
        Ok(report)
    }

    /// Row counts of every published artifact currently on disk.
    fn published_artifacts(&self) -> BTreeMap<String, ArtifactRef> {
        let layout = &self.config.layout;
        let mut artifacts = BTreeMap::new();
        for artifact in Artifact::PUBLISHED {
            let path = artifact.path(layout);
            if !path.is_file() {
                continue;
            }
            match count_rows(&path) {
                Ok(rows) => {
                    let shown = path.strip_prefix(&layout.root).unwrap_or(&path);
                    artifacts.insert(
                        artifact.name().to_string(),
                        ArtifactRef {
                            path: shown.display().to_string(),
                            rows,
                        },
                    );
                }
                Err(e) => warn!(artifact = %artifact, error = %e, "Could not count rows"),
            }
        }
        artifacts
    }
}

enum Executed {
    Built(TransformOutput),
    Gate(GateReport),
}
