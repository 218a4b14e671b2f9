//! `00`: one score row per indexed match.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::table::{read_jsonl, write_jsonl};

use super::derived::{AppearanceRow, ScoreRow};
use super::{result_code, TransformContext, TransformOutput};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::error::StepError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Final score taken from the raw event.
    Original,
    /// Lineups were scraped but no score was recorded.
    ZeroZeroAssumed,
    NotScraped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullScoreRow {
    pub match_id: u64,
    pub season: String,
    pub competition_slug: String,
    pub round: Option<u32>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub score_source: ScoreSource,
    pub total_goals: Option<u32>,
    pub result: Option<String>,
}

pub fn build(ctx: &TransformContext<'_>) -> Result<TransformOutput, StepError> {
    let layout = ctx.layout;
    let scores: Vec<ScoreRow> = read_jsonl(&Artifact::MatchScores.path(layout))?;
    let appearances: Vec<AppearanceRow> = read_jsonl(&Artifact::PlayerAppearances.path(layout))?;

    let by_id: HashMap<u64, &ScoreRow> = scores.iter().map(|s| (s.match_id, s)).collect();
    let appeared: HashSet<u64> = appearances.iter().map(|a| a.match_id).collect();

    let mut rows: Vec<FullScoreRow> = ctx
        .index
        .iter()
        .map(|record| {
            let score = by_id.get(&record.match_id);
            let original = score.and_then(|s| s.home_score.zip(s.away_score));

            let (home_score, away_score, score_source) = match original {
                Some((h, a)) => (Some(h), Some(a), ScoreSource::Original),
                None if appeared.contains(&record.match_id) => {
                    (Some(0), Some(0), ScoreSource::ZeroZeroAssumed)
                }
                None => (None, None, ScoreSource::NotScraped),
            };
            let scored = home_score.zip(away_score);

            FullScoreRow {
                match_id: record.match_id,
                season: record.season.clone(),
                competition_slug: record.competition_slug.clone(),
                round: record.round,
                home_team: score
                    .map(|s| s.home_team.clone())
                    .or_else(|| record.home_team_name.clone()),
                away_team: score
                    .map(|s| s.away_team.clone())
                    .or_else(|| record.away_team_name.clone()),
                home_score,
                away_score,
                score_source,
                total_goals: scored.map(|(h, a)| h + a),
                result: scored.map(|(h, a)| result_code(h, a).to_string()),
            }
        })
        .collect();
    rows.sort_by_key(|r| r.match_id);

    let written = write_jsonl(&Artifact::MatchScoresFull.path(layout), &rows)?;
    let not_scraped = rows
        .iter()
        .filter(|r| r.score_source == ScoreSource::NotScraped)
        .count();
    info!(rows = written, not_scraped, "Built full match scores");

    Ok(vec![(Artifact::MatchScoresFull, written)])
}
