use std::path::{Path, PathBuf};

use crate::config::DataLayout;
use crate::error::StorageError;
use crate::index::MatchRecord;
use crate::storage::filesystem::{ensure_directory, remove_dir, replace_dir, staging_path};

use super::source::{RawMatch, COMPLETION_MARKER};

/// Writes raw artifact sets into the raw tree, one match directory at a time.
pub struct RawWriter<'a> {
    layout: &'a DataLayout,
}

impl<'a> RawWriter<'a> {
    pub fn new(layout: &'a DataLayout) -> Self {
        Self { layout }
    }

    pub fn match_dir(&self, record: &MatchRecord) -> PathBuf {
        self.layout.match_dir(record)
    }

    /// Whether a complete raw artifact set exists for the match.
    pub fn is_complete(&self, record: &MatchRecord) -> bool {
        self.match_dir(record).join(COMPLETION_MARKER).is_file()
    }

    /// Stages every file in a hidden sibling directory, then swaps it into
    /// place. A crash leaves at most a hidden `.{match_id}.partial` directory.
    pub fn write(&self, record: &MatchRecord, raw: &RawMatch) -> Result<PathBuf, StorageError> {
        let target = self.match_dir(record);
        let staged = staging_path(&target, "partial");

        if staged.exists() {
            remove_dir(&staged)?;
        }
        ensure_directory(&staged)?;

        for file in &raw.files {
            let path = staged.join(safe_file_name(&file.name));
            std::fs::write(&path, &file.bytes).map_err(|e| StorageError::WriteFile {
                path: path.clone(),
                source: e,
            })?;
        }

        replace_dir(&staged, &target)?;
        Ok(target)
    }
}

/// Keeps payload names inside the match directory.
fn safe_file_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("payload.json")
}
