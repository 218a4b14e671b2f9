use crate::extraction::ExtractionReport;
use crate::ledger::RunStatus;
use crate::quality::{GateReport, Severity};

use super::error::{PipelineWarning, StepError};
use super::progress::{ProgressEvent, ProgressReporter};
use super::transforms::TransformOutput;

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Completed { rows: TransformOutput },
    /// Outputs already newer than inputs.
    Skipped { reason: String },
    Failed { error: String, remediation: String },
    Evaluated { verdict: Severity },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: String,
    pub status: StepStatus,
}

/// State accumulated while one run walks its step window.
pub struct RunContext {
    pub run_id: i64,

    // Steps that executed, in order. Skipped steps are not listed.
    pub steps_run: Vec<String>,
    pub outcomes: Vec<StepOutcome>,

    // First failing step, or the first gate that reported FAIL
    pub failed_step: Option<String>,
    pub step_failed: bool,

    pub dq: Option<GateReport>,
    pub validation: Option<GateReport>,
    pub extraction: Vec<ExtractionReport>,

    pub remediation: Vec<String>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl RunContext {
    pub fn new(run_id: i64) -> Self {
        Self {
            run_id,
            steps_run: Vec::new(),
            outcomes: Vec::new(),
            failed_step: None,
            step_failed: false,
            dq: None,
            validation: None,
            extraction: Vec::new(),
            remediation: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_completed(
        &mut self,
        step: &str,
        rows: TransformOutput,
        progress: &dyn ProgressReporter,
    ) {
        self.steps_run.push(step.to_string());
        progress.report(ProgressEvent::StepCompleted {
            step: step.to_string(),
            rows: rows.clone(),
        });
        self.outcomes.push(StepOutcome {
            step: step.to_string(),
            status: StepStatus::Completed { rows },
        });
    }

    pub fn record_skipped(&mut self, step: &str, reason: String, progress: &dyn ProgressReporter) {
        progress.report(ProgressEvent::StepSkipped {
            step: step.to_string(),
            reason: reason.clone(),
        });
        self.outcomes.push(StepOutcome {
            step: step.to_string(),
            status: StepStatus::Skipped { reason },
        });
    }

    pub fn record_failure(&mut self, step: &str, error: &StepError, progress: &dyn ProgressReporter) {
        let remediation = error.remediation(step);
        tracing::error!(step = %step, error = %error, "Step failed");
        progress.report(ProgressEvent::StepFailed {
            step: step.to_string(),
            error: error.to_string(),
        });

        self.steps_run.push(step.to_string());
        self.step_failed = true;
        if self.failed_step.is_none() {
            self.failed_step = Some(step.to_string());
        }
        self.remediation.push(remediation.clone());
        self.outcomes.push(StepOutcome {
            step: step.to_string(),
            status: StepStatus::Failed {
                error: error.to_string(),
                remediation,
            },
        });
    }

    pub fn record_gate(&mut self, step: &str, report: GateReport, progress: &dyn ProgressReporter) {
        let verdict = report.verdict();
        progress.report(ProgressEvent::GateEvaluated {
            gate: report.gate.clone(),
            verdict: verdict.to_string(),
        });

        self.steps_run.push(step.to_string());
        if verdict == Severity::Fail && self.failed_step.is_none() {
            self.failed_step = Some(step.to_string());
        }
        for result in &report.results {
            if result.severity == Severity::Pass {
                continue;
            }
            if let Some(hint) = &result.remediation_hint {
                if !self.remediation.contains(hint) {
                    self.remediation.push(hint.clone());
                }
            }
        }
        self.outcomes.push(StepOutcome {
            step: step.to_string(),
            status: StepStatus::Evaluated { verdict },
        });

        match report.gate.as_str() {
            "validate" => self.validation = Some(report),
            _ => self.dq = Some(report),
        }
    }

    /// Whether both gates evaluated the data this run leaves behind.
    pub fn gated(&self) -> bool {
        self.dq.is_some() && self.validation.is_some()
    }

    fn gate_verdict(&self) -> Severity {
        self.dq
            .iter()
            .chain(self.validation.iter())
            .map(GateReport::verdict)
            .max()
            .unwrap_or(Severity::Pass)
    }

    /// `fail` on any step failure or FAIL check, `partial_fail` on warnings only.
    pub fn status(&self) -> RunStatus {
        if self.step_failed {
            return RunStatus::Fail;
        }
        match self.gate_verdict() {
            Severity::Fail => RunStatus::Fail,
            Severity::Warn => RunStatus::PartialFail,
            Severity::Pass if !self.warnings.is_empty() => RunStatus::PartialFail,
            Severity::Pass => RunStatus::Ok,
        }
    }

    pub fn into_summary(self, status: RunStatus, promoted: bool) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            status,
            failed_step: self.failed_step,
            steps_run: self.steps_run,
            outcomes: self.outcomes,
            dq: self.dq,
            validation: self.validation,
            extraction: self.extraction,
            remediation: self.remediation,
            warnings: self.warnings,
            promoted,
        }
    }
}

/// What a finished run reports back to its caller.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub failed_step: Option<String>,
    pub steps_run: Vec<String>,
    pub outcomes: Vec<StepOutcome>,
    pub dq: Option<GateReport>,
    pub validation: Option<GateReport>,
    pub extraction: Vec<ExtractionReport>,
    pub remediation: Vec<String>,
    pub warnings: Vec<PipelineWarning>,
    /// Whether the latest-success pointer now names this run.
    pub promoted: bool,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn outcome(&self, step: &str) -> Option<&StepStatus> {
        self.outcomes
            .iter()
            .find(|o| o.step == step)
            .map(|o| &o.status)
    }
}
