//! `01`: per-team season aggregates over scored matches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::storage::table::{read_jsonl, write_jsonl};

use super::scores::FullScoreRow;
use super::{TransformContext, TransformOutput};
use crate::pipeline::artifact::Artifact;
use crate::pipeline::error::StepError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonRow {
    pub team_name: String,
    pub season: String,
    pub competition_slug: String,
    pub matches: u32,
    pub home_matches: u32,
    pub away_matches: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_diff: i64,
    pub points: u32,
}

impl TeamSeasonRow {
    fn record(&mut self, home: bool, scored: u32, conceded: u32) {
        self.matches += 1;
        if home {
            self.home_matches += 1;
        } else {
            self.away_matches += 1;
        }
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => {
                self.wins += 1;
                self.points += 3;
            }
            std::cmp::Ordering::Equal => {
                self.draws += 1;
                self.points += 1;
            }
            std::cmp::Ordering::Less => self.losses += 1,
        }
        self.goals_for += scored;
        self.goals_against += conceded;
        self.goal_diff = i64::from(self.goals_for) - i64::from(self.goals_against);
    }
}

pub fn build(ctx: &TransformContext<'_>) -> Result<TransformOutput, StepError> {
    let layout = ctx.layout;
    let scores: Vec<FullScoreRow> = read_jsonl(&Artifact::MatchScoresFull.path(layout))?;

    let mut table: BTreeMap<(String, String, String), TeamSeasonRow> = BTreeMap::new();
    for row in &scores {
        let (Some(home_score), Some(away_score)) = (row.home_score, row.away_score) else {
            continue;
        };
        let sides = [
            (row.home_team.as_deref(), true, home_score, away_score),
            (row.away_team.as_deref(), false, away_score, home_score),
        ];
        for (team, home, scored, conceded) in sides {
            let Some(team) = team.filter(|t| !t.is_empty()) else {
                continue;
            };
            let key = (
                team.to_string(),
                row.season.clone(),
                row.competition_slug.clone(),
            );
            table
                .entry(key)
                .or_insert_with_key(|(team_name, season, competition_slug)| TeamSeasonRow {
                    team_name: team_name.clone(),
                    season: season.clone(),
                    competition_slug: competition_slug.clone(),
                    ..TeamSeasonRow::default()
                })
                .record(home, scored, conceded);
        }
    }

    let rows: Vec<TeamSeasonRow> = table.into_values().collect();
    let written = write_jsonl(&Artifact::TeamSeasonStats.path(layout), &rows)?;
    info!(rows = written, "Built team season stats");

    Ok(vec![(Artifact::TeamSeasonStats, written)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataLayout;
    use crate::index::MatchIndex;
    use crate::pipeline::transforms::scores::ScoreSource;
    use tempfile::TempDir;

    fn score(match_id: u64, home: &str, away: &str, hs: Option<u32>, aws: Option<u32>) -> FullScoreRow {
        FullScoreRow {
            match_id,
            season: "2024".to_string(),
            competition_slug: "mls".to_string(),
            round: None,
            home_team: Some(home.to_string()),
            away_team: Some(away.to_string()),
            home_score: hs,
            away_score: aws,
            score_source: if hs.is_some() {
                ScoreSource::Original
            } else {
                ScoreSource::NotScraped
            },
            total_goals: hs.zip(aws).map(|(h, a)| h + a),
            result: None,
        }
    }

    #[test]
    fn test_aggregates_wins_draws_losses() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        write_jsonl(
            &Artifact::MatchScoresFull.path(&layout),
            &[
                score(1, "Austin", "Dallas", Some(2), Some(0)),
                score(2, "Dallas", "Austin", Some(1), Some(1)),
                score(3, "Austin", "Dallas", None, None),
            ],
        )
        .unwrap();

        let index = MatchIndex::default();
        let ctx = TransformContext {
            layout: &layout,
            index: &index,
        };
        assert_eq!(build(&ctx).unwrap(), vec![(Artifact::TeamSeasonStats, 2)]);

        let rows: Vec<TeamSeasonRow> =
            read_jsonl(&Artifact::TeamSeasonStats.path(&layout)).unwrap();
        let austin = &rows[0];
        assert_eq!(austin.team_name, "Austin");
        assert_eq!((austin.matches, austin.home_matches, austin.away_matches), (2, 1, 1));
        assert_eq!((austin.wins, austin.draws, austin.losses), (1, 1, 0));
        assert_eq!((austin.goals_for, austin.goals_against, austin.goal_diff), (3, 1, 2));
        assert_eq!(austin.points, 4);

        let dallas = &rows[1];
        assert_eq!(dallas.points, 1);
        assert_eq!(dallas.goal_diff, -2);
    }
}
