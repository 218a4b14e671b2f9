//! `derived`: player appearances and match scores from the raw tree.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::extraction::COMPLETION_MARKER;
use crate::storage::filesystem::is_hidden;
use crate::storage::table::{write_csv, write_jsonl};

use super::{TransformContext, TransformOutput};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::error::StepError;

/// One player in one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceRow {
    pub match_id: u64,
    pub season: String,
    pub realm: String,
    pub competition_slug: String,
    pub team: String,
    pub side: String,
    pub player_id: u64,
    pub player_name: String,
    pub position: Option<String>,
    pub substitute: bool,
    pub minutes_played: Option<u32>,
    pub rating: Option<f64>,
    pub goals: u32,
    pub assists: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub match_id: u64,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

#[derive(Deserialize)]
struct EventFile {
    event: EventBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventBody {
    home_team: TeamRef,
    away_team: TeamRef,
    #[serde(default)]
    home_score: Option<ScoreRef>,
    #[serde(default)]
    away_score: Option<ScoreRef>,
}

#[derive(Deserialize)]
struct TeamRef {
    name: String,
}

#[derive(Deserialize)]
struct ScoreRef {
    #[serde(default)]
    current: Option<u32>,
}

#[derive(Deserialize, Default)]
struct LineupsFile {
    #[serde(default)]
    home: Option<SideLineup>,
    #[serde(default)]
    away: Option<SideLineup>,
}

#[derive(Deserialize, Default)]
struct SideLineup {
    #[serde(default)]
    players: Vec<LineupEntry>,
}

#[derive(Deserialize)]
struct LineupEntry {
    player: PlayerRef,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    substitute: bool,
    #[serde(default)]
    statistics: Option<PlayerStatistics>,
}

#[derive(Deserialize)]
struct PlayerRef {
    id: u64,
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PlayerStatistics {
    #[serde(default)]
    minutes_played: Option<u32>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    goals: Option<u32>,
    #[serde(default)]
    goal_assist: Option<u32>,
}

/// A complete match directory in the raw tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatchDir {
    pub season: String,
    pub realm: String,
    pub competition_slug: String,
    pub match_id: u64,
    pub path: PathBuf,
}

/// Complete match directories under `raw_base/{season}/{realm}/{slug}/{id}`,
/// in path order. Hidden (staging) entries and directories without the
/// completion marker are ignored.
pub fn scan_raw_tree(raw_base: &Path) -> Result<Vec<RawMatchDir>, StorageError> {
    if !raw_base.is_dir() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(raw_base)
        .max_depth(4)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));

    let mut dirs = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| StorageError::ScanFailed {
            path: raw_base.to_path_buf(),
            source: e,
        })?;
        if entry.depth() != 4
            || !entry.file_type().is_dir()
            || !entry.path().join(COMPLETION_MARKER).is_file()
        {
            continue;
        }

        let parts: Vec<String> = entry
            .path()
            .strip_prefix(raw_base)
            .unwrap_or(entry.path())
            .iter()
            .map(|c| c.to_string_lossy().into_owned())
            .collect();
        let [season, realm, competition_slug, id] = parts.as_slice() else {
            continue;
        };
        let Ok(match_id) = id.parse::<u64>() else {
            warn!(path = %entry.path().display(), "Skipping raw directory with non-numeric match id");
            continue;
        };

        dirs.push(RawMatchDir {
            season: season.clone(),
            realm: realm.clone(),
            competition_slug: competition_slug.clone(),
            match_id,
            path: entry.path().to_path_buf(),
        });
    }
    Ok(dirs)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Raw file unreadable");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping malformed raw file");
            None
        }
    }
}

fn side_rows(
    dir: &RawMatchDir,
    side: &str,
    team: &str,
    lineup: Option<SideLineup>,
    out: &mut Vec<AppearanceRow>,
) {
    for entry in lineup.unwrap_or_default().players {
        let stats = entry.statistics.unwrap_or_default();
        out.push(AppearanceRow {
            match_id: dir.match_id,
            season: dir.season.clone(),
            realm: dir.realm.clone(),
            competition_slug: dir.competition_slug.clone(),
            team: team.to_string(),
            side: side.to_string(),
            player_id: entry.player.id,
            player_name: entry.player.name,
            position: entry.position.filter(|p| !p.is_empty()),
            substitute: entry.substitute,
            minutes_played: stats.minutes_played,
            rating: stats.rating,
            goals: stats.goals.unwrap_or(0),
            assists: stats.goal_assist.unwrap_or(0),
        });
    }
}

pub fn build(ctx: &TransformContext<'_>) -> Result<TransformOutput, StepError> {
    let dirs = scan_raw_tree(&ctx.layout.raw_base)?;

    let mut appearances = Vec::new();
    let mut scores = Vec::new();
    for dir in &dirs {
        let Some(lineups) = read_json::<LineupsFile>(&dir.path.join(COMPLETION_MARKER)) else {
            continue;
        };
        let event = read_json::<EventFile>(&dir.path.join("event.json")).map(|f| f.event);

        let indexed = ctx.index.get(dir.match_id);
        let (home_team, away_team) = match &event {
            Some(e) => (e.home_team.name.clone(), e.away_team.name.clone()),
            None => (
                indexed
                    .and_then(|r| r.home_team_name.clone())
                    .unwrap_or_default(),
                indexed
                    .and_then(|r| r.away_team_name.clone())
                    .unwrap_or_default(),
            ),
        };

        side_rows(dir, "home", &home_team, lineups.home, &mut appearances);
        side_rows(dir, "away", &away_team, lineups.away, &mut appearances);

        if let Some(event) = event {
            scores.push(ScoreRow {
                match_id: dir.match_id,
                home_team,
                away_team,
                home_score: event.home_score.and_then(|s| s.current),
                away_score: event.away_score.and_then(|s| s.current),
            });
        }
    }

    // Stable sort keeps lineup order within a side.
    appearances.sort_by(|a, b| {
        (a.match_id, a.side != "home").cmp(&(b.match_id, b.side != "home"))
    });
    scores.sort_by_key(|s| s.match_id);

    let layout = ctx.layout;
    let n_appearances = write_jsonl(&Artifact::PlayerAppearances.path(layout), &appearances)?;
    write_csv(&Artifact::PlayerAppearancesCsv.path(layout), &appearances)?;
    let n_scores = write_jsonl(&Artifact::MatchScores.path(layout), &scores)?;

    info!(
        matches = dirs.len(),
        appearances = n_appearances,
        scores = n_scores,
        "Built derived tables"
    );

    Ok(vec![
        (Artifact::PlayerAppearances, n_appearances),
        (Artifact::PlayerAppearancesCsv, n_appearances),
        (Artifact::MatchScores, n_scores),
    ])
}
