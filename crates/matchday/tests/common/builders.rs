//! Builders for index records, raw payloads and scripted sources.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;

use matchday::extraction::{FetchError, HttpErrorClass, RawFile, RawMatch, Sleeper};
use matchday::{MatchRecord, MatchSource};

/// Builder for a Match Index row. Defaults to `ligue-1/2024-25`, realm `club`.
pub struct MatchRecordBuilder {
    record: MatchRecord,
}

impl MatchRecordBuilder {
    pub fn new(match_id: u64) -> Self {
        Self {
            record: MatchRecord {
                match_id,
                competition_slug: "ligue-1".to_string(),
                season: "2024-25".to_string(),
                realm: "club".to_string(),
                round: None,
                match_date: None,
                home_team_name: None,
                away_team_name: None,
            },
        }
    }

    pub fn competition(mut self, slug: &str) -> Self {
        self.record.competition_slug = slug.to_string();
        self
    }

    pub fn season(mut self, season: &str) -> Self {
        self.record.season = season.to_string();
        self
    }

    pub fn round(mut self, round: u32) -> Self {
        self.record.round = Some(round);
        self
    }

    pub fn teams(mut self, home: &str, away: &str) -> Self {
        self.record.home_team_name = Some(home.to_string());
        self.record.away_team_name = Some(away.to_string());
        self
    }

    pub fn build(self) -> MatchRecord {
        self.record
    }
}

/// One lineup entry in a raw `lineups.json`.
#[derive(Debug, Clone)]
pub struct PlayerLine {
    pub id: u64,
    pub name: String,
    pub minutes: u32,
    pub rating: f64,
    pub goals: u32,
    pub substitute: bool,
}

impl PlayerLine {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            minutes: 90,
            rating: 7.0,
            goals: 0,
            substitute: false,
        }
    }

    pub fn goals(mut self, goals: u32) -> Self {
        self.goals = goals;
        self
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "player": { "id": self.id, "name": self.name },
            "position": "M",
            "substitute": self.substitute,
            "statistics": {
                "minutesPlayed": self.minutes,
                "rating": self.rating,
                "goals": self.goals,
            }
        })
    }
}

pub fn event_json(home: &str, away: &str, home_score: u32, away_score: u32) -> String {
    json!({
        "event": {
            "homeTeam": { "name": home },
            "awayTeam": { "name": away },
            "homeScore": { "current": home_score },
            "awayScore": { "current": away_score },
        }
    })
    .to_string()
}

pub fn lineups_json(home: &[PlayerLine], away: &[PlayerLine]) -> String {
    json!({
        "home": { "players": home.iter().map(PlayerLine::to_json).collect::<Vec<_>>() },
        "away": { "players": away.iter().map(PlayerLine::to_json).collect::<Vec<_>>() },
    })
    .to_string()
}

/// A complete raw artifact set: one scorer per goal on each side, plus a
/// goalless player so lineups have two entries per team. Player ids are
/// derived from `match_id` so no two matches share a player.
pub fn fixture_match(match_id: u64, home: &str, away: &str, score: (u32, u32)) -> RawMatch {
    let base = match_id * 10;
    let home_players = vec![
        PlayerLine::new(base + 1, &format!("{} Striker", home)).goals(score.0),
        PlayerLine::new(base + 2, &format!("{} Keeper", home)),
    ];
    let away_players = vec![
        PlayerLine::new(base + 3, &format!("{} Striker", away)).goals(score.1),
        PlayerLine::new(base + 4, &format!("{} Keeper", away)),
    ];

    RawMatch {
        files: vec![
            RawFile::new("event.json", event_json(home, away, score.0, score.1)),
            RawFile::new("lineups.json", lineups_json(&home_players, &away_players)),
        ],
        missing_optional: Vec::new(),
    }
}

enum Script {
    Succeed(RawMatch),
    Fail(HttpErrorClass),
}

/// Replays a fixed answer per match id. Unscripted ids fail with a network error.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<u64, Script>,
    /// Match ids in fetch order, one entry per attempt.
    pub calls: Vec<u64>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(mut self, match_id: u64, raw: RawMatch) -> Self {
        self.scripts.insert(match_id, Script::Succeed(raw));
        self
    }

    pub fn fail(mut self, match_id: u64, class: HttpErrorClass) -> Self {
        self.scripts.insert(match_id, Script::Fail(class));
        self
    }

    pub fn attempts_for(&self, match_id: u64) -> usize {
        self.calls.iter().filter(|&&id| id == match_id).count()
    }
}

impl MatchSource for ScriptedSource {
    fn fetch(&mut self, record: &MatchRecord) -> Result<RawMatch, FetchError> {
        self.calls.push(record.match_id);
        match self.scripts.get(&record.match_id) {
            Some(Script::Succeed(raw)) => Ok(raw.clone()),
            Some(Script::Fail(class)) => Err(FetchError::new(
                *class,
                "event",
                format!("scripted failure for {}", record.match_id),
            )),
            None => Err(FetchError::new(
                HttpErrorClass::Network,
                "event",
                format!("no script for {}", record.match_id),
            )),
        }
    }
}

/// Sleeper that returns immediately.
pub struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}
