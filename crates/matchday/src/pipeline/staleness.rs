//! Modification-time staleness check for build steps.

use std::time::SystemTime;

use crate::config::DataLayout;
use crate::error::StorageError;
use crate::storage::filesystem::{modified_time, newest_mtime};

use super::artifact::Artifact;
use super::step::StepDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(String),
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

fn artifact_mtime(layout: &DataLayout, artifact: Artifact) -> Result<Option<SystemTime>, StorageError> {
    let path = artifact.path(layout);
    if artifact.is_table() {
        Ok(modified_time(&path))
    } else {
        newest_mtime(&path)
    }
}

/// A step is fresh when every declared output exists and the oldest output is
/// no older than the newest declared input. Steps without outputs are never
/// fresh.
pub fn check(layout: &DataLayout, step: &StepDescriptor) -> Result<Freshness, StorageError> {
    if step.writes.is_empty() {
        return Ok(Freshness::Stale("step has no outputs".to_string()));
    }

    let mut oldest_output: Option<SystemTime> = None;
    for artifact in step.writes {
        match artifact_mtime(layout, *artifact)? {
            Some(mtime) => {
                oldest_output = Some(oldest_output.map_or(mtime, |o| o.min(mtime)));
            }
            None => return Ok(Freshness::Stale(format!("output {} is missing", artifact))),
        }
    }

    let mut newest_input: Option<(SystemTime, Artifact)> = None;
    for artifact in step.reads {
        if let Some(mtime) = artifact_mtime(layout, *artifact)? {
            if newest_input.map_or(true, |(n, _)| mtime > n) {
                newest_input = Some((mtime, *artifact));
            }
        }
    }

    match (oldest_output, newest_input) {
        (Some(out), Some((input, artifact))) if input > out => Ok(Freshness::Stale(format!(
            "input {} is newer than outputs",
            artifact
        ))),
        _ => Ok(Freshness::Fresh),
    }
}
