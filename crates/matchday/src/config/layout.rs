use std::path::{Path, PathBuf};

use crate::config::schema::PathSettings;
use crate::index::MatchRecord;

/// Fully resolved filesystem roots for one data tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub root: PathBuf,
    pub raw_base: PathBuf,
    pub index_path: PathBuf,
    pub derived_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub index_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl DataLayout {
    pub fn resolve(root: &Path, paths: &PathSettings) -> Self {
        let join = |p: &str| {
            let p = Path::new(p);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };

        Self {
            root: root.to_path_buf(),
            raw_base: join(&paths.raw_base),
            index_path: join(&paths.index_path),
            derived_dir: join(&paths.derived_dir),
            processed_dir: join(&paths.processed_dir),
            index_dir: join(&paths.index_dir),
            log_dir: join(&paths.log_dir),
        }
    }

    /// Default layout below `root`.
    pub fn under(root: &Path) -> Self {
        Self::resolve(root, &PathSettings::default())
    }

    /// `raw/{season}/{realm}/{competition_slug}/{match_id}`
    pub fn match_dir(&self, record: &MatchRecord) -> PathBuf {
        self.raw_base
            .join(&record.season)
            .join(&record.realm)
            .join(&record.competition_slug)
            .join(record.match_id.to_string())
    }

    pub fn database_path(&self) -> PathBuf {
        self.index_dir.join("matchday.db")
    }

    pub fn progress_csv_path(&self) -> PathBuf {
        self.index_dir.join("extraction_progress.csv")
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.index_dir.join("latest_successful_run.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.index_dir.join(".pipeline.lock")
    }

    pub fn dq_report_path(&self) -> PathBuf {
        self.processed_dir.join("dq_report.json")
    }
}
