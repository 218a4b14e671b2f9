//! Extraction outcome repository: append-only rows in `extraction_outcomes`.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct OutcomeRow {
    pub id: i64,
    pub extraction_run_id: i64,
    pub match_id: u64,
    pub competition_slug: String,
    pub season: String,
    pub status: String,
    pub http_error_class: Option<String>,
    pub attempt_count: u32,
    pub detail: Option<String>,
    pub recorded_at: String,
}

impl OutcomeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            extraction_run_id: row.get("extraction_run_id")?,
            match_id: row.get::<_, i64>("match_id")? as u64,
            competition_slug: row.get("competition_slug")?,
            season: row.get("season")?,
            status: row.get("status")?,
            http_error_class: row.get("http_error_class")?,
            attempt_count: row.get("attempt_count")?,
            detail: row.get("detail")?,
            recorded_at: row.get("recorded_at")?,
        })
    }
}

/// Appends an outcome row. `row.id` is ignored; the assigned id is returned.
pub fn insert(db: &Database, row: &OutcomeRow) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO extraction_outcomes (extraction_run_id, match_id, competition_slug,
             season, status, http_error_class, attempt_count, detail, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.extraction_run_id,
                row.match_id as i64,
                row.competition_slug,
                row.season,
                row.status,
                row.http_error_class,
                row.attempt_count,
                row.detail,
                row.recorded_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Most recent outcome for a match, including `skipped` rows.
pub fn latest_for_match(db: &Database, match_id: u64) -> Result<Option<OutcomeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM extraction_outcomes WHERE match_id = ?1 ORDER BY id DESC LIMIT 1",
                params![match_id as i64],
                OutcomeRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Most recent outcome for a match where extraction was actually attempted.
pub fn latest_attempt_for_match(
    db: &Database,
    match_id: u64,
) -> Result<Option<OutcomeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM extraction_outcomes
                 WHERE match_id = ?1 AND status != 'skipped'
                 ORDER BY id DESC LIMIT 1",
                params![match_id as i64],
                OutcomeRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

pub fn list_for_match(db: &Database, match_id: u64) -> Result<Vec<OutcomeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM extraction_outcomes WHERE match_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![match_id as i64], OutcomeRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn list_for_run(db: &Database, extraction_run_id: i64) -> Result<Vec<OutcomeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM extraction_outcomes WHERE extraction_run_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![extraction_run_id], OutcomeRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
