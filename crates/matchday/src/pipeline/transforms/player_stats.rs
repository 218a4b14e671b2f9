//! `03` and `04`: player season and career aggregates.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::table::{read_jsonl, write_jsonl};

use super::derived::AppearanceRow;
use super::{mean, per_90, TransformContext, TransformOutput};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::error::StepError;

/// Minimum minutes for per-90 figures to be considered meaningful in a season.
pub const SEASON_MIN_MINUTES: u32 = 450;
/// Same threshold over a career.
pub const CAREER_MIN_MINUTES: u32 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonRow {
    pub player_id: u64,
    pub player_name: String,
    pub season: String,
    pub competition_slug: String,
    pub team: String,
    pub appearances: u32,
    pub minutes_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub mean_rating: Option<f64>,
    pub goals_per_90: Option<f64>,
    pub sufficient_minutes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCareerRow {
    pub player_id: u64,
    pub player_name: String,
    pub seasons: u32,
    pub competitions: u32,
    pub first_season: String,
    pub last_season: String,
    pub appearances: u32,
    pub minutes_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub goals_per_90: Option<f64>,
    pub sufficient_minutes: bool,
}

#[derive(Default)]
struct SeasonTally {
    player_name: String,
    team: String,
    appearances: u32,
    minutes: u32,
    goals: u32,
    assists: u32,
    ratings: Vec<f64>,
}

pub fn build_season(ctx: &TransformContext<'_>) -> Result<TransformOutput, StepError> {
    let layout = ctx.layout;
    let appearances: Vec<AppearanceRow> = read_jsonl(&Artifact::PlayerAppearances.path(layout))?;

    let mut tallies: BTreeMap<(u64, String, String), SeasonTally> = BTreeMap::new();
    for app in &appearances {
        // Unused substitutes are listed in lineups but never played.
        let minutes = app.minutes_played.unwrap_or(0);
        if minutes == 0 {
            continue;
        }
        let tally = tallies
            .entry((app.player_id, app.season.clone(), app.competition_slug.clone()))
            .or_default();
        // The latest name and team in match order win.
        tally.player_name = app.player_name.clone();
        tally.team = app.team.clone();
        tally.appearances += 1;
        tally.minutes += minutes;
        tally.goals += app.goals;
        tally.assists += app.assists;
        if let Some(rating) = app.rating {
            tally.ratings.push(rating);
        }
    }

    let rows: Vec<PlayerSeasonRow> = tallies
        .into_iter()
        .map(|((player_id, season, competition_slug), t)| PlayerSeasonRow {
            player_id,
            player_name: t.player_name,
            season,
            competition_slug,
            team: t.team,
            appearances: t.appearances,
            minutes_played: t.minutes,
            goals: t.goals,
            assists: t.assists,
            mean_rating: mean(&t.ratings),
            goals_per_90: per_90(t.goals, t.minutes),
            sufficient_minutes: t.minutes >= SEASON_MIN_MINUTES,
        })
        .collect();

    let written = write_jsonl(&Artifact::PlayerSeasonStats.path(layout), &rows)?;
    info!(rows = written, "Built player season stats");

    Ok(vec![(Artifact::PlayerSeasonStats, written)])
}

#[derive(Default)]
struct CareerTally {
    player_name: String,
    seasons: BTreeSet<String>,
    competitions: BTreeSet<String>,
    appearances: u32,
    minutes: u32,
    goals: u32,
    assists: u32,
}

pub fn build_career(ctx: &TransformContext<'_>) -> Result<TransformOutput, StepError> {
    let layout = ctx.layout;
    let seasons: Vec<PlayerSeasonRow> = read_jsonl(&Artifact::PlayerSeasonStats.path(layout))?;

    let mut tallies: BTreeMap<u64, CareerTally> = BTreeMap::new();
    for row in &seasons {
        let tally = tallies.entry(row.player_id).or_default();
        tally.player_name = row.player_name.clone();
        tally.seasons.insert(row.season.clone());
        tally.competitions.insert(row.competition_slug.clone());
        tally.appearances += row.appearances;
        tally.minutes += row.minutes_played;
        tally.goals += row.goals;
        tally.assists += row.assists;
    }

    let rows: Vec<PlayerCareerRow> = tallies
        .into_iter()
        .map(|(player_id, t)| PlayerCareerRow {
            player_id,
            player_name: t.player_name,
            seasons: t.seasons.len() as u32,
            competitions: t.competitions.len() as u32,
            first_season: t.seasons.first().cloned().unwrap_or_default(),
            last_season: t.seasons.last().cloned().unwrap_or_default(),
            appearances: t.appearances,
            minutes_played: t.minutes,
            goals: t.goals,
            assists: t.assists,
            goals_per_90: per_90(t.goals, t.minutes),
            sufficient_minutes: t.minutes >= CAREER_MIN_MINUTES,
        })
        .collect();

    let written = write_jsonl(&Artifact::PlayerCareerStats.path(layout), &rows)?;
    info!(rows = written, "Built player career stats");

    Ok(vec![(Artifact::PlayerCareerStats, written)])
}
