use tracing::{info, warn};

use super::artifact::Artifact;

/// Events emitted by the orchestrator while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        run_id: i64,
        steps: Vec<String>,
    },
    StepStarted {
        step: String,
        label: String,
    },
    StepSkipped {
        step: String,
        reason: String,
    },
    StepCompleted {
        step: String,
        rows: Vec<(Artifact, usize)>,
    },
    StepFailed {
        step: String,
        error: String,
    },
    GateEvaluated {
        gate: String,
        verdict: String,
    },
    RunFinished {
        run_id: i64,
        status: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes every event to the tracing subscriber.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { run_id, steps } => {
                info!(run_id, steps = %steps.join(","), "Run started");
            }
            ProgressEvent::StepStarted { step, label } => {
                info!(step = %step, "Running {}", label);
            }
            ProgressEvent::StepSkipped { step, reason } => {
                info!(step = %step, reason = %reason, "Step skipped");
            }
            ProgressEvent::StepCompleted { step, rows } => {
                let rows = rows
                    .iter()
                    .map(|(artifact, n)| format!("{}={}", artifact, n))
                    .collect::<Vec<_>>()
                    .join(" ");
                info!(step = %step, rows = %rows, "Step completed");
            }
            ProgressEvent::StepFailed { step, error } => {
                warn!(step = %step, error = %error, "Step failed");
            }
            ProgressEvent::GateEvaluated { gate, verdict } => {
                info!(gate = %gate, verdict = %verdict, "Gate evaluated");
            }
            ProgressEvent::RunFinished { run_id, status } => {
                info!(run_id, status = %status, "Run finished");
            }
        }
    }
}
