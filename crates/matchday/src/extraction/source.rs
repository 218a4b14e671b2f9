use crate::index::MatchRecord;

use super::error::FetchError;

/// Raw file whose presence marks a match directory as complete.
pub const COMPLETION_MARKER: &str = "lineups.json";

/// One payload file of a raw artifact set, e.g. `event.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            bytes: bytes.into(),
        }
    }
}

/// Everything fetched for one match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMatch {
    pub files: Vec<RawFile>,
    /// Optional endpoints that could not be fetched. The match still counts as extracted.
    pub missing_optional: Vec<String>,
}

impl RawMatch {
    pub fn has_completion_marker(&self) -> bool {
        self.files.iter().any(|f| f.name == COMPLETION_MARKER)
    }
}

/// Where raw match data comes from. One call is one attempt; retrying is the
/// engine's job.
pub trait MatchSource {
    fn fetch(&mut self, record: &MatchRecord) -> Result<RawMatch, FetchError>;
}
