//! `02`: one summary row per match with lineup data.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::table::{read_jsonl, write_jsonl};

use super::derived::{AppearanceRow, ScoreRow};
use super::scores::FullScoreRow;
use super::{mean, TransformContext, TransformOutput};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::error::StepError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummaryRow {
    pub match_id: u64,
    pub season: String,
    pub competition_slug: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub result: Option<String>,
    pub home_players: u32,
    pub away_players: u32,
    pub home_mean_rating: Option<f64>,
    pub away_mean_rating: Option<f64>,
}

#[derive(Default)]
struct SideTally {
    team: Option<String>,
    players: u32,
    ratings: Vec<f64>,
}

#[derive(Default)]
struct MatchTally {
    season: String,
    competition_slug: String,
    home: SideTally,
    away: SideTally,
}

pub fn build(ctx: &TransformContext<'_>) -> Result<TransformOutput, StepError> {
    let layout = ctx.layout;
    let full: Vec<FullScoreRow> = read_jsonl(&Artifact::MatchScoresFull.path(layout))?;
    let raw_scores: Vec<ScoreRow> = read_jsonl(&Artifact::MatchScores.path(layout))?;
    let appearances: Vec<AppearanceRow> = read_jsonl(&Artifact::PlayerAppearances.path(layout))?;

    let full_by_id: HashMap<u64, &FullScoreRow> = full.iter().map(|r| (r.match_id, r)).collect();
    let raw_by_id: HashMap<u64, &ScoreRow> = raw_scores.iter().map(|r| (r.match_id, r)).collect();

    let mut matches: BTreeMap<u64, MatchTally> = BTreeMap::new();
    for app in &appearances {
        let tally = matches.entry(app.match_id).or_insert_with(|| MatchTally {
            season: app.season.clone(),
            competition_slug: app.competition_slug.clone(),
            ..MatchTally::default()
        });
        let side = if app.side == "home" {
            &mut tally.home
        } else {
            &mut tally.away
        };
        if side.team.is_none() && !app.team.is_empty() {
            side.team = Some(app.team.clone());
        }
        side.players += 1;
        if let Some(rating) = app.rating {
            side.ratings.push(rating);
        }
    }

    let rows: Vec<MatchSummaryRow> = matches
        .into_iter()
        .map(|(match_id, tally)| {
            let raw = raw_by_id.get(&match_id);
            let scored = full_by_id.get(&match_id);
            // Teams come from the raw event; the lineups are the fallback.
            let home_team = raw
                .map(|r| r.home_team.clone())
                .or(tally.home.team)
                .unwrap_or_default();
            let away_team = raw
                .map(|r| r.away_team.clone())
                .or(tally.away.team)
                .unwrap_or_default();

            MatchSummaryRow {
                match_id,
                season: tally.season,
                competition_slug: tally.competition_slug,
                home_team,
                away_team,
                home_score: scored.and_then(|s| s.home_score),
                away_score: scored.and_then(|s| s.away_score),
                result: scored.and_then(|s| s.result.clone()),
                home_players: tally.home.players,
                away_players: tally.away.players,
                home_mean_rating: mean(&tally.home.ratings),
                away_mean_rating: mean(&tally.away.ratings),
            }
        })
        .collect();

    let written = write_jsonl(&Artifact::MatchSummary.path(layout), &rows)?;
    info!(rows = written, "Built match summary");

    Ok(vec![(Artifact::MatchSummary, written)])
}
