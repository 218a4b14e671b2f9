use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::filesystem::write_atomic;

use super::LedgerError;

/// Location and size of one published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: String,
    pub rows: usize,
}

/// The single record consumers read to find the current data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestSuccessPointer {
    pub run_id: i64,
    pub ended_at: String,
    pub status: String,
    #[serde(default)]
    pub steps_run: Vec<String>,
    pub env: String,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactRef>,
}

impl LatestSuccessPointer {
    pub fn read(path: &Path) -> Result<Option<Self>, LedgerError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFile {
                    path: path.to_path_buf(),
                    source: e,
                }
                .into())
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| LedgerError::Pointer {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Replaces the pointer at `path` unless it already names this or a newer run.
    pub fn promote(&self, path: &Path) -> Result<bool, LedgerError> {
        if let Some(current) = Self::read(path)? {
            if current.run_id >= self.run_id {
                return Ok(false);
            }
        }

        let payload = serde_json::to_vec_pretty(self).map_err(|e| LedgerError::Pointer {
            path: path.to_path_buf(),
            source: e,
        })?;
        write_atomic(path, &payload)?;
        Ok(true)
    }
}
