//! Expected column shapes of every consumer-facing table.

use serde_json::Value;

use crate::pipeline::Artifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Number,
    String,
    Bool,
}

impl ColumnType {
    /// Whether a typed JSON value fits. `null` is handled by the caller.
    pub fn accepts_json(self, value: &Value) -> bool {
        match self {
            ColumnType::Integer => value.is_i64() || value.is_u64(),
            ColumnType::Number => value.is_number(),
            ColumnType::String => value.is_string(),
            ColumnType::Bool => value.is_boolean(),
        }
    }

    /// Whether a CSV cell parses as this type.
    pub fn accepts_text(self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            ColumnType::Integer => cell.parse::<i64>().is_ok(),
            ColumnType::Number => cell.parse::<f64>().is_ok(),
            ColumnType::String => true,
            ColumnType::Bool => matches!(cell, "true" | "false"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn req(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: false,
    }
}

const fn opt(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: true,
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactSchema {
    pub artifact: Artifact,
    pub columns: Vec<ColumnSpec>,
}

pub fn standard_schemas() -> Vec<ArtifactSchema> {
    use ColumnType::{Bool, Integer, Number, String};

    let appearances = vec![
        req("match_id", Integer),
        req("season", String),
        req("realm", String),
        req("competition_slug", String),
        opt("team", String),
        req("side", String),
        req("player_id", Integer),
        req("player_name", String),
        opt("position", String),
        req("substitute", Bool),
        opt("minutes_played", Integer),
        opt("rating", Number),
        req("goals", Integer),
        req("assists", Integer),
    ];

    vec![
        ArtifactSchema {
            artifact: Artifact::MatchIndex,
            columns: vec![
                req("match_id", Integer),
                req("season", String),
                opt("realm", String),
                req("competition_slug", String),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::ExtractionProgress,
            columns: vec![
                req("competition_slug", String),
                req("season", String),
                req("total", Integer),
                req("attempted", Integer),
                req("succeeded", Integer),
                req("failed", Integer),
                req("run_status", String),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::PlayerAppearances,
            columns: appearances.clone(),
        },
        ArtifactSchema {
            artifact: Artifact::PlayerAppearancesCsv,
            columns: appearances,
        },
        ArtifactSchema {
            artifact: Artifact::MatchScores,
            columns: vec![
                req("match_id", Integer),
                opt("home_team", String),
                opt("away_team", String),
                opt("home_score", Integer),
                opt("away_score", Integer),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::MatchScoresFull,
            columns: vec![
                req("match_id", Integer),
                req("season", String),
                req("competition_slug", String),
                opt("home_score", Integer),
                opt("away_score", Integer),
                req("score_source", String),
                opt("total_goals", Integer),
                opt("result", String),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::TeamSeasonStats,
            columns: vec![
                req("team_name", String),
                req("season", String),
                req("competition_slug", String),
                req("matches", Integer),
                req("wins", Integer),
                req("draws", Integer),
                req("losses", Integer),
                req("goals_for", Integer),
                req("goals_against", Integer),
                req("goal_diff", Integer),
                req("points", Integer),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::MatchSummary,
            columns: vec![
                req("match_id", Integer),
                req("season", String),
                req("competition_slug", String),
                opt("home_team", String),
                opt("away_team", String),
                opt("home_score", Integer),
                opt("away_score", Integer),
                opt("result", String),
                req("home_players", Integer),
                req("away_players", Integer),
                opt("home_mean_rating", Number),
                opt("away_mean_rating", Number),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::PlayerSeasonStats,
            columns: vec![
                req("player_id", Integer),
                req("season", String),
                req("competition_slug", String),
                req("appearances", Integer),
                req("minutes_played", Integer),
                req("goals", Integer),
                req("assists", Integer),
                opt("mean_rating", Number),
                opt("goals_per_90", Number),
                req("sufficient_minutes", Bool),
            ],
        },
        ArtifactSchema {
            artifact: Artifact::PlayerCareerStats,
            columns: vec![
                req("player_id", Integer),
                req("seasons", Integer),
                req("competitions", Integer),
                req("first_season", String),
                req("last_season", String),
                req("minutes_played", Integer),
                req("goals", Integer),
                req("assists", Integer),
                opt("goals_per_90", Number),
                req("sufficient_minutes", Bool),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_and_text_acceptance() {
        assert!(ColumnType::Integer.accepts_json(&json!(3)));
        assert!(!ColumnType::Integer.accepts_json(&json!(3.5)));
        assert!(ColumnType::Number.accepts_json(&json!(3)));
        assert!(!ColumnType::String.accepts_json(&json!(1)));
        assert!(ColumnType::Bool.accepts_json(&json!(false)));

        assert!(ColumnType::Integer.accepts_text(" 42 "));
        assert!(!ColumnType::Integer.accepts_text("4.2"));
        assert!(ColumnType::Number.accepts_text("4.2"));
        assert!(ColumnType::Bool.accepts_text("true"));
        assert!(!ColumnType::Bool.accepts_text("yes"));
    }

    #[test]
    fn test_every_published_artifact_has_a_schema() {
        let schemas = standard_schemas();
        for artifact in Artifact::PUBLISHED {
            assert!(schemas.iter().any(|s| s.artifact == *artifact), "{}", artifact);
        }
    }
}
