//! Build-step transforms.
//!
//! Each transform is a plain function of the artifacts its step declares as
//! reads. Outputs are sorted before writing so identical inputs produce
//! identical files.

pub mod derived;
pub mod match_summary;
pub mod player_stats;
pub mod scores;
pub mod team_stats;

use crate::config::DataLayout;
use crate::index::MatchIndex;

use super::artifact::Artifact;
use super::error::StepError;

/// Read-only inputs shared by every transform.
pub struct TransformContext<'a> {
    pub layout: &'a DataLayout,
    pub index: &'a MatchIndex,
}

/// Row counts written per artifact.
pub type TransformOutput = Vec<(Artifact, usize)>;

pub type TransformFn = fn(&TransformContext<'_>) -> Result<TransformOutput, StepError>;

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(round2(values.iter().sum::<f64>() / values.len() as f64))
    }
}

pub(crate) fn per_90(count: u32, minutes: u32) -> Option<f64> {
    if minutes == 0 {
        None
    } else {
        Some(round2(f64::from(count) * 90.0 / f64::from(minutes)))
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `H`, `D` or `A` from the home side's point of view.
pub(crate) fn result_code(home: u32, away: u32) -> &'static str {
    match home.cmp(&away) {
        std::cmp::Ordering::Greater => "H",
        std::cmp::Ordering::Equal => "D",
        std::cmp::Ordering::Less => "A",
    }
}
