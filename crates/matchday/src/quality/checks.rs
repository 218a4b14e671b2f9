//! The standard DQ checks.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use serde_json::Value;

use crate::pipeline::error::rerun_hint;
use crate::pipeline::transforms::player_stats::{CAREER_MIN_MINUTES, SEASON_MIN_MINUTES};
use crate::pipeline::transforms::scores::ScoreSource;
use crate::pipeline::Artifact;
use crate::storage::filesystem::modified_time;
use crate::storage::table::{
    cell_bool, cell_f64, cell_i64, cell_str, cell_u64, count_rows, read_rows, Row,
};

use super::{CheckContext, DqCheck, DqCheckResult};

/// Ids listed in check messages before truncating.
const MAX_LISTED: usize = 10;

/// Largest plausible goal count for one side of a match.
const MAX_TEAM_SCORE: i64 = 15;

/// Share of indexed matches that should have been scraped.
const MIN_SCRAPED_COVERAGE: f64 = 0.85;

pub fn standard_checks() -> Vec<Box<dyn DqCheck>> {
    vec![
        Box::new(MatchIdsInIndex {
            artifacts: &[Artifact::PlayerAppearances, Artifact::MatchSummary],
        }),
        Box::new(UniqueKeys {
            artifact: Artifact::ExtractionProgress,
            key: &["competition_slug", "season"],
        }),
        Box::new(UniqueKeys {
            artifact: Artifact::TeamSeasonStats,
            key: &["team_name", "season", "competition_slug"],
        }),
        Box::new(UniqueKeys {
            artifact: Artifact::PlayerSeasonStats,
            key: &["player_id", "season", "competition_slug"],
        }),
        Box::new(UniqueKeys {
            artifact: Artifact::PlayerCareerStats,
            key: &["player_id"],
        }),
        Box::new(MirrorParity {
            name: "appearances_mirror_parity",
            canonical: Artifact::PlayerAppearances,
            mirror: Artifact::PlayerAppearancesCsv,
        }),
        Box::new(TeamVocabulary),
        Box::new(ScoresConsistent),
        Box::new(RowRule {
            name: "score_source_values_valid",
            artifact: Artifact::MatchScoresFull,
            key: "match_id",
            holds: score_source_valid,
        }),
        Box::new(RowRule {
            name: "scores_in_range_0_15",
            artifact: Artifact::MatchScoresFull,
            key: "match_id",
            holds: scores_in_range,
        }),
        Box::new(ScrapedCoverage {
            min_fraction: MIN_SCRAPED_COVERAGE,
        }),
        Box::new(RowRule {
            name: "goal_diff_correct",
            artifact: Artifact::TeamSeasonStats,
            key: "team_name",
            holds: goal_diff_correct,
        }),
        Box::new(RowRule {
            name: "matches_home_plus_away_eq_total",
            artifact: Artifact::TeamSeasonStats,
            key: "team_name",
            holds: home_away_matches_add_up,
        }),
        Box::new(RowRule {
            name: "home_away_team_names_differ",
            artifact: Artifact::MatchSummary,
            key: "match_id",
            holds: team_names_differ,
        }),
        Box::new(SummaryScoresMatchFull),
        Box::new(RowRule {
            name: "sufficient_minutes_flag_correct:03_player_season_stats",
            artifact: Artifact::PlayerSeasonStats,
            key: "player_id",
            holds: season_minutes_flag,
        }),
        Box::new(RowRule {
            name: "mean_rating_in_range_1_10",
            artifact: Artifact::PlayerSeasonStats,
            key: "player_id",
            holds: rating_in_range,
        }),
        Box::new(CareerGoalsMatchSeasons),
        Box::new(CareerPlayersInSeasons),
        Box::new(RowRule {
            name: "first_season_lte_last_season",
            artifact: Artifact::PlayerCareerStats,
            key: "player_id",
            holds: season_span_ordered,
        }),
        Box::new(RowRule {
            name: "sufficient_minutes_flag_correct:04_player_career_stats",
            artifact: Artifact::PlayerCareerStats,
            key: "player_id",
            holds: career_minutes_flag,
        }),
        Box::new(Freshness {
            artifact: Artifact::MatchSummary,
        }),
    ]
}

/// Ids referenced downstream but absent from the index (`missing`), and
/// indexed ids not yet reflected downstream (`extra`).
pub fn referential_diff(
    referenced: &BTreeSet<u64>,
    indexed: &BTreeSet<u64>,
) -> (BTreeSet<u64>, BTreeSet<u64>) {
    let missing = referenced.difference(indexed).copied().collect();
    let extra = indexed.difference(referenced).copied().collect();
    (missing, extra)
}

fn list_ids<T: ToString>(ids: impl IntoIterator<Item = T>) -> String {
    let mut listed: Vec<String> = Vec::new();
    let mut total = 0;
    for id in ids {
        if listed.len() < MAX_LISTED {
            listed.push(id.to_string());
        }
        total += 1;
    }
    if total > listed.len() {
        format!("{}, ... ({} more)", listed.join(", "), total - listed.len())
    } else {
        listed.join(", ")
    }
}

fn missing_artifact(ctx: &CheckContext<'_>, check: &str, artifact: Artifact) -> DqCheckResult {
    let producer = ctx.chain.producer_id(artifact);
    DqCheckResult::fail(
        check,
        format!(
            "{} is missing at {}",
            artifact,
            artifact.path(ctx.layout).display()
        ),
        rerun_hint(producer, producer),
    )
}

/// Loads a table, turning an absent or unreadable file into a FAIL result.
fn load(ctx: &CheckContext<'_>, check: &str, artifact: Artifact) -> Result<Vec<Row>, DqCheckResult> {
    let path = artifact.path(ctx.layout);
    if !path.is_file() {
        return Err(missing_artifact(ctx, check, artifact));
    }
    read_rows(&path).map_err(|e| {
        let producer = ctx.chain.producer_id(artifact);
        DqCheckResult::fail(
            check,
            format!("{} is unreadable: {}", artifact, e),
            rerun_hint(producer, producer),
        )
    })
}

fn key_cell(row: &Row, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub struct MatchIdsInIndex {
    pub artifacts: &'static [Artifact],
}

impl DqCheck for MatchIdsInIndex {
    fn name(&self) -> String {
        "match_ids_in_index".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let mut referenced = BTreeSet::new();
        for artifact in self.artifacts {
            let rows = match load(ctx, &name, *artifact) {
                Ok(rows) => rows,
                Err(result) => return result,
            };
            referenced.extend(rows.iter().filter_map(|r| cell_u64(r, "match_id")));
        }

        let (missing, extra) = referential_diff(&referenced, &ctx.index.ids());
        let mut message = format!("{} missing, {} extra", missing.len(), extra.len());
        if !missing.is_empty() {
            message.push_str(&format!("; missing: [{}]", list_ids(&missing)));
        }
        if !extra.is_empty() {
            message.push_str(&format!("; extra: [{}]", list_ids(&extra)));
        }

        if !missing.is_empty() {
            DqCheckResult::fail(
                &name,
                message,
                format!(
                    "restore the listed matches in the match index or remove their raw data, then {}",
                    rerun_hint("derived", "02")
                ),
            )
        } else if !extra.is_empty() {
            DqCheckResult::warn(&name, message, rerun_hint("extract", "02"))
        } else {
            DqCheckResult::pass(&name, message)
        }
    }
}

pub struct UniqueKeys {
    pub artifact: Artifact,
    pub key: &'static [&'static str],
}

impl DqCheck for UniqueKeys {
    fn name(&self) -> String {
        format!("unique_keys:{}", self.artifact)
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let rows = match load(ctx, &name, self.artifact) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let mut counts: BTreeMap<Vec<String>, usize> = BTreeMap::new();
        for row in &rows {
            let key = self.key.iter().map(|c| key_cell(row, c)).collect();
            *counts.entry(key).or_default() += 1;
        }
        let duplicates: Vec<String> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(key, n)| format!("({}) x{}", key.join(", "), n))
            .collect();

        if duplicates.is_empty() {
            DqCheckResult::pass(
                &name,
                format!("{} rows, key ({}) unique", rows.len(), self.key.join(", ")),
            )
        } else {
            let producer = ctx.chain.producer_id(self.artifact);
            DqCheckResult::fail(
                &name,
                format!(
                    "{} duplicate key(s) on ({}): {}",
                    duplicates.len(),
                    self.key.join(", "),
                    list_ids(&duplicates)
                ),
                rerun_hint(producer, producer),
            )
        }
    }
}

/// Row-count parity between a canonical table and its flat-text mirror.
pub struct MirrorParity {
    pub name: &'static str,
    pub canonical: Artifact,
    pub mirror: Artifact,
}

impl DqCheck for MirrorParity {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let mut counts = Vec::with_capacity(2);
        for artifact in [self.canonical, self.mirror] {
            let path = artifact.path(ctx.layout);
            if !path.is_file() {
                return missing_artifact(ctx, self.name, artifact);
            }
            match count_rows(&path) {
                Ok(n) => counts.push(n),
                Err(e) => {
                    let producer = ctx.chain.producer_id(artifact);
                    return DqCheckResult::fail(
                        self.name,
                        format!("{} is unreadable: {}", artifact, e),
                        rerun_hint(producer, producer),
                    );
                }
            }
        }

        let message = format!(
            "{}={} rows, {}={} rows",
            self.canonical, counts[0], self.mirror, counts[1]
        );
        if counts[0] == counts[1] {
            DqCheckResult::pass(self.name, message)
        } else {
            let producer = ctx.chain.producer_id(self.mirror);
            DqCheckResult::fail(self.name, message, rerun_hint(producer, producer))
        }
    }
}

/// Team names in the match summary must appear in team season stats. The two
/// tables can legitimately diverge when built from different raw snapshots,
/// so a gap is a warning.
pub struct TeamVocabulary;

impl DqCheck for TeamVocabulary {
    fn name(&self) -> String {
        "team_vocabulary_02_in_01".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let summary = match load(ctx, &name, Artifact::MatchSummary) {
            Ok(rows) => rows,
            Err(result) => return result,
        };
        let teams = match load(ctx, &name, Artifact::TeamSeasonStats) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let vocabulary: BTreeSet<&str> = teams
            .iter()
            .filter_map(|r| cell_str(r, "team_name"))
            .collect();
        let unknown: BTreeSet<&str> = summary
            .iter()
            .flat_map(|r| [cell_str(r, "home_team"), cell_str(r, "away_team")])
            .flatten()
            .filter(|t| !t.is_empty() && !vocabulary.contains(t))
            .collect();

        if unknown.is_empty() {
            DqCheckResult::pass(&name, format!("{} team names known", vocabulary.len()))
        } else {
            DqCheckResult::warn(
                &name,
                format!(
                    "{} team name(s) in 02 not in 01: {}",
                    unknown.len(),
                    list_ids(&unknown)
                ),
                rerun_hint("01", "02"),
            )
        }
    }
}

/// `total_goals` and `result` in the full score table agree with the scores.
pub struct ScoresConsistent;

impl DqCheck for ScoresConsistent {
    fn name(&self) -> String {
        "scores_consistent".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let rows = match load(ctx, &name, Artifact::MatchScoresFull) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let mut bad = Vec::new();
        for row in &rows {
            let home = cell_i64(row, "home_score");
            let away = cell_i64(row, "away_score");
            let total = cell_i64(row, "total_goals");
            let result = cell_str(row, "result");
            let consistent = match (home, away) {
                (Some(h), Some(a)) => {
                    let expected = match h.cmp(&a) {
                        std::cmp::Ordering::Greater => "H",
                        std::cmp::Ordering::Equal => "D",
                        std::cmp::Ordering::Less => "A",
                    };
                    total == Some(h + a) && result == Some(expected)
                }
                _ => total.is_none() && result.is_none(),
            };
            if !consistent {
                bad.push(cell_u64(row, "match_id").unwrap_or_default());
            }
        }

        if bad.is_empty() {
            DqCheckResult::pass(&name, format!("{} rows consistent", rows.len()))
        } else {
            DqCheckResult::fail(
                &name,
                format!("{} inconsistent row(s): {}", bad.len(), list_ids(&bad)),
                rerun_hint("00", "00"),
            )
        }
    }
}

/// Career goals equal the sum of season goals per player.
pub struct CareerGoalsMatchSeasons;

impl DqCheck for CareerGoalsMatchSeasons {
    fn name(&self) -> String {
        "career_goals_match_seasons".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let seasons = match load(ctx, &name, Artifact::PlayerSeasonStats) {
            Ok(rows) => rows,
            Err(result) => return result,
        };
        let careers = match load(ctx, &name, Artifact::PlayerCareerStats) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let mut season_goals: HashMap<u64, i64> = HashMap::new();
        for row in &seasons {
            if let Some(player_id) = cell_u64(row, "player_id") {
                *season_goals.entry(player_id).or_default() += cell_i64(row, "goals").unwrap_or(0);
            }
        }

        let mut bad = BTreeSet::new();
        for row in &careers {
            let Some(player_id) = cell_u64(row, "player_id") else {
                continue;
            };
            let expected = season_goals.remove(&player_id).unwrap_or(0);
            if cell_i64(row, "goals").unwrap_or(0) != expected {
                bad.insert(player_id);
            }
        }
        // Players with season rows but no career row.
        bad.extend(season_goals.into_keys());

        if bad.is_empty() {
            DqCheckResult::pass(&name, format!("{} careers consistent", careers.len()))
        } else {
            DqCheckResult::fail(
                &name,
                format!("{} player(s) disagree: {}", bad.len(), list_ids(&bad)),
                rerun_hint("03", "04"),
            )
        }
    }
}

/// A per-row predicate over one table. Rows that break it fail the check,
/// listed by `key`.
pub struct RowRule {
    pub name: &'static str,
    pub artifact: Artifact,
    pub key: &'static str,
    pub holds: fn(&Row) -> bool,
}

impl DqCheck for RowRule {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let rows = match load(ctx, self.name, self.artifact) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let bad: Vec<String> = rows
            .iter()
            .filter(|row| !(self.holds)(row))
            .map(|row| key_cell(row, self.key))
            .collect();

        if bad.is_empty() {
            DqCheckResult::pass(self.name, format!("{} rows ok", rows.len()))
        } else {
            let producer = ctx.chain.producer_id(self.artifact);
            DqCheckResult::fail(
                self.name,
                format!(
                    "{} of {} row(s) in {}: {}",
                    bad.len(),
                    rows.len(),
                    self.artifact,
                    list_ids(&bad)
                ),
                rerun_hint(producer, producer),
            )
        }
    }
}

fn score_source_valid(row: &Row) -> bool {
    row.get("score_source")
        .map(|v| serde_json::from_value::<ScoreSource>(v.clone()).is_ok())
        .unwrap_or(false)
}

fn scores_in_range(row: &Row) -> bool {
    ["home_score", "away_score"].iter().all(|column| match row.get(*column) {
        None | Some(Value::Null) => true,
        Some(_) => cell_i64(row, column).is_some_and(|g| (0..=MAX_TEAM_SCORE).contains(&g)),
    })
}

fn goal_diff_correct(row: &Row) -> bool {
    match (
        cell_i64(row, "goals_for"),
        cell_i64(row, "goals_against"),
        cell_i64(row, "goal_diff"),
    ) {
        (Some(scored), Some(conceded), Some(diff)) => scored - conceded == diff,
        _ => false,
    }
}

fn home_away_matches_add_up(row: &Row) -> bool {
    match (
        cell_i64(row, "home_matches"),
        cell_i64(row, "away_matches"),
        cell_i64(row, "matches"),
    ) {
        (Some(home), Some(away), Some(total)) => home + away == total,
        _ => false,
    }
}

fn team_names_differ(row: &Row) -> bool {
    let home = cell_str(row, "home_team").unwrap_or_default().trim();
    let away = cell_str(row, "away_team").unwrap_or_default().trim();
    home != away
}

fn minutes_flag(row: &Row, threshold: u32) -> bool {
    match (cell_i64(row, "minutes_played"), cell_bool(row, "sufficient_minutes")) {
        (Some(minutes), Some(flag)) => (minutes >= i64::from(threshold)) == flag,
        _ => false,
    }
}

fn season_minutes_flag(row: &Row) -> bool {
    minutes_flag(row, SEASON_MIN_MINUTES)
}

fn career_minutes_flag(row: &Row) -> bool {
    minutes_flag(row, CAREER_MIN_MINUTES)
}

fn rating_in_range(row: &Row) -> bool {
    match row.get("mean_rating") {
        None | Some(Value::Null) => true,
        Some(_) => cell_f64(row, "mean_rating").is_some_and(|r| (1.0..=10.0).contains(&r)),
    }
}

// Season labels ("2023-24", "2024") sort chronologically as text.
fn season_span_ordered(row: &Row) -> bool {
    match (cell_str(row, "first_season"), cell_str(row, "last_season")) {
        (Some(first), Some(last)) => first <= last,
        _ => false,
    }
}

/// WARN when too many full-score rows are `not_scraped`.
pub struct ScrapedCoverage {
    pub min_fraction: f64,
}

impl DqCheck for ScrapedCoverage {
    fn name(&self) -> String {
        "scraped_coverage".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let rows = match load(ctx, &name, Artifact::MatchScoresFull) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let not_scraped = rows
            .iter()
            .filter(|r| cell_str(r, "score_source") == Some("not_scraped"))
            .count();
        let coverage = if rows.is_empty() {
            0.0
        } else {
            (rows.len() - not_scraped) as f64 / rows.len() as f64
        };
        let message = format!(
            "{:.1}% scraped ({} not_scraped of {})",
            coverage * 100.0,
            not_scraped,
            rows.len()
        );

        if coverage >= self.min_fraction {
            DqCheckResult::pass(&name, message)
        } else {
            DqCheckResult::warn(&name, message, rerun_hint("extract", "00"))
        }
    }
}

/// Scores in the match summary agree with the full score table.
pub struct SummaryScoresMatchFull;

impl DqCheck for SummaryScoresMatchFull {
    fn name(&self) -> String {
        "scores_consistent_with_00".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let summary = match load(ctx, &name, Artifact::MatchSummary) {
            Ok(rows) => rows,
            Err(result) => return result,
        };
        let full = match load(ctx, &name, Artifact::MatchScoresFull) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let scores: HashMap<u64, (Option<i64>, Option<i64>)> = full
            .iter()
            .filter_map(|r| {
                let id = cell_u64(r, "match_id")?;
                Some((id, (cell_i64(r, "home_score"), cell_i64(r, "away_score"))))
            })
            .collect();

        let mut compared = 0usize;
        let mut bad = Vec::new();
        for row in &summary {
            let Some(match_id) = cell_u64(row, "match_id") else {
                continue;
            };
            let own = (cell_i64(row, "home_score"), cell_i64(row, "away_score"));
            // Only rows scored on both sides are comparable.
            let Some(&other) = scores.get(&match_id) else {
                continue;
            };
            if own.0.is_none() || other.0.is_none() {
                continue;
            }
            compared += 1;
            if own != other {
                bad.push(match_id);
            }
        }

        if bad.is_empty() {
            DqCheckResult::pass(&name, format!("{} scored matches agree", compared))
        } else {
            DqCheckResult::fail(
                &name,
                format!("{} match(es) disagree with 00: {}", bad.len(), list_ids(&bad)),
                rerun_hint("00", "02"),
            )
        }
    }
}

/// Every career row belongs to a player with season rows.
pub struct CareerPlayersInSeasons;

impl DqCheck for CareerPlayersInSeasons {
    fn name(&self) -> String {
        "all_player_ids_in_03".to_string()
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let seasons = match load(ctx, &name, Artifact::PlayerSeasonStats) {
            Ok(rows) => rows,
            Err(result) => return result,
        };
        let careers = match load(ctx, &name, Artifact::PlayerCareerStats) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let known: BTreeSet<u64> = seasons.iter().filter_map(|r| cell_u64(r, "player_id")).collect();
        let unknown: BTreeSet<u64> = careers
            .iter()
            .filter_map(|r| cell_u64(r, "player_id"))
            .filter(|id| !known.contains(id))
            .collect();

        if unknown.is_empty() {
            DqCheckResult::pass(&name, format!("{} career players known", careers.len()))
        } else {
            DqCheckResult::fail(
                &name,
                format!("{} player(s) in 04 not in 03: {}", unknown.len(), list_ids(&unknown)),
                rerun_hint("03", "04"),
            )
        }
    }
}

/// WARN when an artifact has not been rebuilt within the freshness window.
pub struct Freshness {
    pub artifact: Artifact,
}

impl DqCheck for Freshness {
    fn name(&self) -> String {
        format!("freshness:{}", self.artifact)
    }

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult {
        let name = self.name();
        let Some(mtime) = modified_time(&self.artifact.path(ctx.layout)) else {
            return missing_artifact(ctx, &name, self.artifact);
        };

        let age = ctx.now.duration_since(mtime).unwrap_or(Duration::ZERO);
        let hours = age.as_secs() / 3600;
        let message = format!(
            "last built {}h ago (window {}h)",
            hours,
            ctx.freshness.as_secs() / 3600
        );
        if age > ctx.freshness {
            let producer = ctx.chain.producer_id(self.artifact);
            DqCheckResult::warn(&name, message, rerun_hint(producer, producer))
        } else {
            DqCheckResult::pass(&name, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataLayout;
    use crate::index::{MatchIndex, MatchRecord};
    use crate::pipeline::StepChain;
    use crate::quality::Severity;
    use crate::storage::table::write_jsonl;
    use serde_json::json;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn index(ids: &[u64]) -> MatchIndex {
        MatchIndex::from_records(
            ids.iter()
                .map(|&match_id| MatchRecord {
                    match_id,
                    competition_slug: "ligue-1".to_string(),
                    season: "2024-25".to_string(),
                    realm: "club".to_string(),
                    round: None,
                    match_date: None,
                    home_team_name: None,
                    away_team_name: None,
                })
                .collect(),
        )
        .unwrap()
    }

    fn ctx<'a>(layout: &'a DataLayout, index: &'a MatchIndex, chain: &'a StepChain) -> CheckContext<'a> {
        CheckContext {
            layout,
            index,
            chain,
            now: SystemTime::now(),
            freshness: Duration::from_secs(48 * 3600),
        }
    }

    fn write(layout: &DataLayout, artifact: Artifact, rows: &[Value]) {
        write_jsonl(&artifact.path(layout), rows).unwrap();
    }

    #[test]
    fn test_referential_diff() {
        let referenced: BTreeSet<u64> = [1, 2, 99].into();
        let indexed: BTreeSet<u64> = [1, 2, 3].into();
        let (missing, extra) = referential_diff(&referenced, &indexed);
        assert_eq!(missing, BTreeSet::from([99]));
        assert_eq!(extra, BTreeSet::from([3]));
    }

    #[test]
    fn test_match_ids_missing_is_fail_extra_is_warn() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let check = MatchIdsInIndex {
            artifacts: &[Artifact::PlayerAppearances, Artifact::MatchSummary],
        };

        write(&layout, Artifact::PlayerAppearances, &[json!({"match_id": 1}), json!({"match_id": 2})]);
        write(&layout, Artifact::MatchSummary, &[json!({"match_id": 1})]);

        let idx = index(&[1, 2, 3]);
        let result = check.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Warn);
        assert!(result.message.starts_with("0 missing, 1 extra"));
        assert!(result.message.contains("extra: [3]"));

        let idx = index(&[1]);
        let result = check.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Fail);
        assert!(result.message.contains("missing: [2]"));
        assert!(result.remediation_hint.unwrap().contains("rerun pipeline"));

        let idx = index(&[1, 2]);
        assert_eq!(check.run(&ctx(&layout, &idx, &chain)).severity, Severity::Pass);
    }

    #[test]
    fn test_missing_artifact_names_producer() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[1]);

        let result = TeamVocabulary.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Fail);
        assert_eq!(
            result.remediation_hint.as_deref(),
            Some("rerun pipeline from step 02")
        );
    }

    #[test]
    fn test_unique_keys() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);
        let check = UniqueKeys {
            artifact: Artifact::PlayerSeasonStats,
            key: &["player_id", "season", "competition_slug"],
        };

        let row = json!({"player_id": 4, "season": "2024-25", "competition_slug": "ligue-1"});
        write(&layout, Artifact::PlayerSeasonStats, &[row.clone()]);
        assert_eq!(check.run(&ctx(&layout, &idx, &chain)).severity, Severity::Pass);

        write(&layout, Artifact::PlayerSeasonStats, &[row.clone(), row]);
        let result = check.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Fail);
        assert!(result.message.contains("(4, 2024-25, ligue-1) x2"));
        assert_eq!(
            result.remediation_hint.as_deref(),
            Some("rerun pipeline from step 03")
        );
    }

    #[test]
    fn test_team_vocabulary_gap_is_warn() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);

        write(&layout, Artifact::TeamSeasonStats, &[json!({"team_name": "Lens"})]);
        write(
            &layout,
            Artifact::MatchSummary,
            &[json!({"match_id": 1, "home_team": "Lens", "away_team": "Lille"})],
        );

        let result = TeamVocabulary.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Warn);
        assert!(result.message.contains("Lille"));
        assert_eq!(
            result.remediation_hint.as_deref(),
            Some("rerun pipeline from step 01 through 02")
        );
    }

    #[test]
    fn test_scores_and_career_consistency() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);

        write(
            &layout,
            Artifact::MatchScoresFull,
            &[
                json!({"match_id": 1, "home_score": 2, "away_score": 1, "total_goals": 3, "result": "H"}),
                json!({"match_id": 2, "home_score": null, "away_score": null, "total_goals": null, "result": null}),
            ],
        );
        assert_eq!(ScoresConsistent.run(&ctx(&layout, &idx, &chain)).severity, Severity::Pass);

        write(
            &layout,
            Artifact::MatchScoresFull,
            &[json!({"match_id": 1, "home_score": 2, "away_score": 1, "total_goals": 3, "result": "D"})],
        );
        assert_eq!(ScoresConsistent.run(&ctx(&layout, &idx, &chain)).severity, Severity::Fail);

        write(
            &layout,
            Artifact::PlayerSeasonStats,
            &[json!({"player_id": 5, "goals": 2}), json!({"player_id": 5, "goals": 3})],
        );
        write(&layout, Artifact::PlayerCareerStats, &[json!({"player_id": 5, "goals": 5})]);
        assert_eq!(
            CareerGoalsMatchSeasons.run(&ctx(&layout, &idx, &chain)).severity,
            Severity::Pass
        );

        write(&layout, Artifact::PlayerCareerStats, &[json!({"player_id": 5, "goals": 4})]);
        assert_eq!(
            CareerGoalsMatchSeasons.run(&ctx(&layout, &idx, &chain)).severity,
            Severity::Fail
        );
    }

    #[test]
    fn test_freshness_window() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);
        write(&layout, Artifact::MatchSummary, &[]);

        let check = Freshness {
            artifact: Artifact::MatchSummary,
        };
        let mut context = ctx(&layout, &idx, &chain);
        assert_eq!(check.run(&context).severity, Severity::Pass);

        context.now = SystemTime::now() + Duration::from_secs(72 * 3600);
        let result = check.run(&context);
        assert_eq!(result.severity, Severity::Warn);
        assert_eq!(
            result.remediation_hint.as_deref(),
            Some("rerun pipeline from step 02")
        );
    }

    #[test]
    fn test_mirror_parity() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);
        let check = MirrorParity {
            name: "appearances_mirror_parity",
            canonical: Artifact::PlayerAppearances,
            mirror: Artifact::PlayerAppearancesCsv,
        };

        write(&layout, Artifact::PlayerAppearances, &[json!({"match_id": 1})]);
        let csv_path = Artifact::PlayerAppearancesCsv.path(&layout);
        std::fs::write(&csv_path, "match_id\n1\n").unwrap();
        assert_eq!(check.run(&ctx(&layout, &idx, &chain)).severity, Severity::Pass);

        std::fs::write(&csv_path, "match_id\n1\n2\n").unwrap();
        assert_eq!(check.run(&ctx(&layout, &idx, &chain)).severity, Severity::Fail);
    }

    #[test]
    fn test_full_score_row_rules() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);
        let checks = standard_checks();
        let run = |name: &str| {
            checks
                .iter()
                .find(|c| c.name() == name)
                .unwrap()
                .run(&ctx(&layout, &idx, &chain))
        };

        write(
            &layout,
            Artifact::MatchScoresFull,
            &[
                json!({"match_id": 1, "home_score": 3, "away_score": 0, "score_source": "original"}),
                json!({"match_id": 2, "home_score": null, "away_score": null, "score_source": "not_scraped"}),
            ],
        );
        assert_eq!(run("score_source_values_valid").severity, Severity::Pass);
        assert_eq!(run("scores_in_range_0_15").severity, Severity::Pass);

        write(
            &layout,
            Artifact::MatchScoresFull,
            &[
                json!({"match_id": 1, "home_score": 16, "away_score": 0, "score_source": "guessed"}),
                json!({"match_id": 2, "home_score": -1, "away_score": 0, "score_source": "original"}),
            ],
        );
        let sources = run("score_source_values_valid");
        assert_eq!(sources.severity, Severity::Fail);
        assert!(sources.message.ends_with(": 1"));
        assert_eq!(sources.remediation_hint.as_deref(), Some("rerun pipeline from step 00"));
        let range = run("scores_in_range_0_15");
        assert_eq!(range.severity, Severity::Fail);
        assert!(range.message.starts_with("2 of 2 row(s)"));
    }

    #[test]
    fn test_scraped_coverage_warns_below_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);
        let check = ScrapedCoverage { min_fraction: 0.85 };

        let mut rows: Vec<Value> = (1..=9)
            .map(|id| json!({"match_id": id, "score_source": "original"}))
            .collect();
        rows.push(json!({"match_id": 10, "score_source": "not_scraped"}));
        write(&layout, Artifact::MatchScoresFull, &rows);
        let result = check.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Pass);
        assert!(result.message.starts_with("90.0% scraped"));

        rows.push(json!({"match_id": 11, "score_source": "not_scraped"}));
        write(&layout, Artifact::MatchScoresFull, &rows);
        let result = check.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Warn);
        assert_eq!(
            result.remediation_hint.as_deref(),
            Some("rerun pipeline from step extract through 00")
        );
    }

    #[test]
    fn test_team_season_arithmetic() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);
        let diff = RowRule {
            name: "goal_diff_correct",
            artifact: Artifact::TeamSeasonStats,
            key: "team_name",
            holds: goal_diff_correct,
        };
        let split = RowRule {
            name: "matches_home_plus_away_eq_total",
            artifact: Artifact::TeamSeasonStats,
            key: "team_name",
            holds: home_away_matches_add_up,
        };

        write(
            &layout,
            Artifact::TeamSeasonStats,
            &[
                json!({"team_name": "Lens", "goals_for": 1, "goals_against": 4, "goal_diff": -3,
                       "matches": 3, "home_matches": 2, "away_matches": 1}),
                json!({"team_name": "Brest", "goals_for": 2, "goals_against": 0, "goal_diff": 1,
                       "matches": 3, "home_matches": 1, "away_matches": 1}),
            ],
        );
        let result = diff.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Fail);
        assert!(result.message.ends_with(": Brest"));
        assert_eq!(result.remediation_hint.as_deref(), Some("rerun pipeline from step 01"));
        assert!(split.run(&ctx(&layout, &idx, &chain)).message.ends_with(": Brest"));
    }

    #[test]
    fn test_match_summary_against_full_scores() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);

        write(
            &layout,
            Artifact::MatchScoresFull,
            &[
                json!({"match_id": 1, "home_score": 2, "away_score": 1}),
                json!({"match_id": 2, "home_score": null, "away_score": null}),
            ],
        );
        write(
            &layout,
            Artifact::MatchSummary,
            &[
                json!({"match_id": 1, "home_team": "Lyon", "away_team": "Nantes", "home_score": 2, "away_score": 1}),
                json!({"match_id": 2, "home_team": "Nice", "away_team": "Lens", "home_score": 0, "away_score": 0}),
            ],
        );
        assert_eq!(SummaryScoresMatchFull.run(&ctx(&layout, &idx, &chain)).severity, Severity::Pass);

        write(
            &layout,
            Artifact::MatchSummary,
            &[json!({"match_id": 1, "home_team": "Lyon ", "away_team": "Lyon", "home_score": 1, "away_score": 1})],
        );
        let result = SummaryScoresMatchFull.run(&ctx(&layout, &idx, &chain));
        assert_eq!(result.severity, Severity::Fail);
        assert!(result.message.contains("disagree with 00: 1"));
        assert_eq!(
            result.remediation_hint.as_deref(),
            Some("rerun pipeline from step 00 through 02")
        );

        let names = RowRule {
            name: "home_away_team_names_differ",
            artifact: Artifact::MatchSummary,
            key: "match_id",
            holds: team_names_differ,
        };
        assert_eq!(names.run(&ctx(&layout, &idx, &chain)).severity, Severity::Fail);
    }

    #[test]
    fn test_player_table_rules() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let chain = StepChain::standard();
        let idx = index(&[]);

        write(
            &layout,
            Artifact::PlayerSeasonStats,
            &[
                json!({"player_id": 5, "minutes_played": 450, "sufficient_minutes": true, "mean_rating": 7.1}),
                json!({"player_id": 6, "minutes_played": 449, "sufficient_minutes": true, "mean_rating": 11.0}),
                json!({"player_id": 7, "minutes_played": 90, "sufficient_minutes": false, "mean_rating": null}),
            ],
        );
        let season_flag = RowRule {
            name: "sufficient_minutes_flag_correct:03_player_season_stats",
            artifact: Artifact::PlayerSeasonStats,
            key: "player_id",
            holds: season_minutes_flag,
        };
        let rating = RowRule {
            name: "mean_rating_in_range_1_10",
            artifact: Artifact::PlayerSeasonStats,
            key: "player_id",
            holds: rating_in_range,
        };
        assert!(season_flag.run(&ctx(&layout, &idx, &chain)).message.ends_with(": 6"));
        assert!(rating.run(&ctx(&layout, &idx, &chain)).message.ends_with(": 6"));

        write(
            &layout,
            Artifact::PlayerCareerStats,
            &[
                json!({"player_id": 5, "minutes_played": 900, "sufficient_minutes": true,
                       "first_season": "2023-24", "last_season": "2024-25"}),
                json!({"player_id": 8, "minutes_played": 899, "sufficient_minutes": false,
                       "first_season": "2024-25", "last_season": "2023-24"}),
            ],
        );
        let span = RowRule {
            name: "first_season_lte_last_season",
            artifact: Artifact::PlayerCareerStats,
            key: "player_id",
            holds: season_span_ordered,
        };
        let career_flag = RowRule {
            name: "sufficient_minutes_flag_correct:04_player_career_stats",
            artifact: Artifact::PlayerCareerStats,
            key: "player_id",
            holds: career_minutes_flag,
        };
        assert!(span.run(&ctx(&layout, &idx, &chain)).message.ends_with(": 8"));
        assert_eq!(career_flag.run(&ctx(&layout, &idx, &chain)).severity, Severity::Pass);

        let subset = CareerPlayersInSeasons.run(&ctx(&layout, &idx, &chain));
        assert_eq!(subset.severity, Severity::Fail);
        assert!(subset.message.contains("not in 03: 8"));
        assert_eq!(subset.remediation_hint.as_deref(), Some("rerun pipeline from step 03 through 04"));
    }

    #[test]
    fn test_csv_flags_are_read() {
        let mut row = Row::new();
        row.insert("minutes_played".to_string(), Value::String("900".to_string()));
        row.insert("sufficient_minutes".to_string(), Value::String("true".to_string()));
        assert!(career_minutes_flag(&row));
        assert!(season_minutes_flag(&row));
    }
}
