//! Extraction Engine: fetches raw match data with bounded retries, a
//! consecutive-failure circuit breaker and atomic per-match writes.

pub mod breaker;
pub mod engine;
pub mod error;
pub mod http;
pub mod progress;
pub mod retry;
pub mod source;
pub mod writer;

pub use breaker::CircuitBreaker;
pub use engine::{
    ExtractionEngine, ExtractionOptions, ExtractionReport, MatchFailure, MatchStatus,
};
pub use error::{ExtractionError, FetchError, HttpErrorClass};
pub use http::HttpMatchSource;
pub use progress::{export_progress_csv, ExtractionProgress, ExtractionRunStatus};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use source::{MatchSource, RawFile, RawMatch, COMPLETION_MARKER};
pub use writer::RawWriter;
