use std::fmt;
use std::path::PathBuf;

use crate::config::DataLayout;

/// Logical artifacts read and written by build steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Artifact {
    MatchIndex,
    RawMatches,
    ExtractionProgress,
    PlayerAppearances,
    PlayerAppearancesCsv,
    MatchScores,
    MatchScoresFull,
    TeamSeasonStats,
    MatchSummary,
    PlayerSeasonStats,
    PlayerCareerStats,
}

impl Artifact {
    pub const ALL: &'static [Artifact] = &[
        Artifact::MatchIndex,
        Artifact::RawMatches,
        Artifact::ExtractionProgress,
        Artifact::PlayerAppearances,
        Artifact::PlayerAppearancesCsv,
        Artifact::MatchScores,
        Artifact::MatchScoresFull,
        Artifact::TeamSeasonStats,
        Artifact::MatchSummary,
        Artifact::PlayerSeasonStats,
        Artifact::PlayerCareerStats,
    ];

    /// Artifacts referenced by the latest-success pointer.
    pub const PUBLISHED: &'static [Artifact] = &[
        Artifact::PlayerAppearances,
        Artifact::PlayerAppearancesCsv,
        Artifact::MatchScores,
        Artifact::MatchScoresFull,
        Artifact::TeamSeasonStats,
        Artifact::MatchSummary,
        Artifact::PlayerSeasonStats,
        Artifact::PlayerCareerStats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Artifact::MatchIndex => "match_index",
            Artifact::RawMatches => "raw_matches",
            Artifact::ExtractionProgress => "extraction_progress",
            Artifact::PlayerAppearances => "player_appearances",
            Artifact::PlayerAppearancesCsv => "player_appearances_csv",
            Artifact::MatchScores => "match_scores",
            Artifact::MatchScoresFull => "00_match_scores_full",
            Artifact::TeamSeasonStats => "01_team_season_stats",
            Artifact::MatchSummary => "02_match_summary",
            Artifact::PlayerSeasonStats => "03_player_season_stats",
            Artifact::PlayerCareerStats => "04_player_career_stats",
        }
    }

    pub fn from_name(name: &str) -> Option<Artifact> {
        Artifact::ALL.iter().copied().find(|a| a.name() == name)
    }

    pub fn path(self, layout: &DataLayout) -> PathBuf {
        match self {
            Artifact::MatchIndex => layout.index_path.clone(),
            Artifact::RawMatches => layout.raw_base.clone(),
            Artifact::ExtractionProgress => layout.progress_csv_path(),
            Artifact::PlayerAppearances => layout.derived_dir.join("player_appearances.jsonl"),
            Artifact::PlayerAppearancesCsv => layout.derived_dir.join("player_appearances.csv"),
            Artifact::MatchScores => layout.derived_dir.join("match_scores.jsonl"),
            Artifact::MatchScoresFull => layout.processed_dir.join("00_match_scores_full.jsonl"),
            Artifact::TeamSeasonStats => layout.processed_dir.join("01_team_season_stats.jsonl"),
            Artifact::MatchSummary => layout.processed_dir.join("02_match_summary.jsonl"),
            Artifact::PlayerSeasonStats => {
                layout.processed_dir.join("03_player_season_stats.jsonl")
            }
            Artifact::PlayerCareerStats => {
                layout.processed_dir.join("04_player_career_stats.jsonl")
            }
        }
    }

    /// The raw tree is a directory; everything else is a single table file.
    pub fn is_table(self) -> bool {
        !matches!(self, Artifact::RawMatches)
    }

    pub fn exists(self, layout: &DataLayout) -> bool {
        let path = self.path(layout);
        if self.is_table() {
            path.is_file()
        } else {
            path.is_dir()
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
