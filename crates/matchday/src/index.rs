//! The Match Index: canonical catalog of known matches.
//!
//! Discovery owns the file; this crate only reads it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Match index not found at '{0}'")]
    Missing(PathBuf),

    #[error("Failed to read match index '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Duplicate match_id {0} in match index")]
    DuplicateMatchId(u64),
}

/// One discovered match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: u64,
    pub competition_slug: String,
    pub season: String,
    #[serde(default)]
    pub realm: String,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub match_date: Option<i64>,
    #[serde(default)]
    pub home_team_name: Option<String>,
    #[serde(default)]
    pub away_team_name: Option<String>,
}

impl MatchRecord {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.competition_slug, &self.season)
    }
}

/// A `(competition_slug, season)` pair: the unit of extraction and progress.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub competition_slug: String,
    pub season: String,
}

impl Scope {
    pub fn new(competition_slug: &str, season: &str) -> Self {
        Self {
            competition_slug: competition_slug.to_string(),
            season: season.to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.competition_slug, self.season)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchIndex {
    records: Vec<MatchRecord>,
    by_id: HashMap<u64, usize>,
}

impl MatchIndex {
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Err(IndexError::Missing(path.to_path_buf()));
        }

        let read_err = |e: csv::Error| IndexError::Read {
            path: path.to_path_buf(),
            source: e,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_err)?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<MatchRecord>, _>>()
            .map_err(read_err)?;

        Self::from_records(records)
    }

    pub fn from_records(records: Vec<MatchRecord>) -> Result<Self, IndexError> {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut normalized = Vec::with_capacity(records.len());
        for mut record in records {
            if record.realm.trim().is_empty() {
                record.realm = "club".to_string();
            }
            if by_id.insert(record.match_id, normalized.len()).is_some() {
                return Err(IndexError::DuplicateMatchId(record.match_id));
            }
            normalized.push(record);
        }
        Ok(Self {
            records: normalized,
            by_id,
        })
    }

    pub fn get(&self, match_id: u64) -> Option<&MatchRecord> {
        self.by_id.get(&match_id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, match_id: u64) -> bool {
        self.by_id.contains_key(&match_id)
    }

    pub fn ids(&self) -> BTreeSet<u64> {
        self.by_id.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every scope present in the index, sorted.
    pub fn scopes(&self) -> Vec<Scope> {
        self.records
            .iter()
            .map(MatchRecord::scope)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Matches of one scope, ordered by round then match_id.
    pub fn in_scope(&self, scope: &Scope) -> Vec<&MatchRecord> {
        let mut matches: Vec<&MatchRecord> = self
            .records
            .iter()
            .filter(|r| r.competition_slug == scope.competition_slug && r.season == scope.season)
            .collect();
        matches.sort_by_key(|r| (r.round.unwrap_or(u32::MAX), r.match_id));
        matches
    }

    pub fn count_by_scope(&self) -> BTreeMap<Scope, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.scope()).or_insert(0) += 1;
        }
        counts
    }
}
