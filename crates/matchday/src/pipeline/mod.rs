//! Build-Step Graph and the orchestrator that walks it.

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod lock;
pub mod progress;
pub mod runner;
pub mod staleness;
pub mod step;
pub mod transforms;

pub use artifact::Artifact;
pub use config::PipelineConfig;
pub use context::{RunContext, RunSummary, StepOutcome, StepStatus};
pub use error::{rerun_hint, PipelineError, PipelineWarning, StepError};
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{Orchestrator, RunRequest};
pub use step::{StepChain, StepDescriptor, StepKind};
