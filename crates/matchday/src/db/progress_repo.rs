//! Extraction run history (`extraction_runs`) and the per-scope
//! progress summary (`extraction_progress`).

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// Canonical progress row, unique per `(competition_slug, season)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRow {
    pub competition_slug: String,
    pub season: String,
    pub total: u32,
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub run_status: String,
    pub last_run_id: i64,
    pub updated_at: String,
}

impl ProgressRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            competition_slug: row.get("competition_slug")?,
            season: row.get("season")?,
            total: row.get("total")?,
            attempted: row.get("attempted")?,
            succeeded: row.get("succeeded")?,
            failed: row.get("failed")?,
            skipped: row.get("skipped")?,
            run_status: row.get("run_status")?,
            last_run_id: row.get("last_run_id")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Opens an extraction run for one scope and returns its id.
pub fn start_run(
    db: &Database,
    competition_slug: &str,
    season: &str,
    started_at: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO extraction_runs (competition_slug, season, started_at)
             VALUES (?1, ?2, ?3)",
            params![competition_slug, season, started_at],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Closes an extraction run and upserts the scope's progress row in one transaction.
pub fn finish_run(db: &Database, progress: &ProgressRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE extraction_runs SET ended_at = ?2, total = ?3, attempted = ?4,
             succeeded = ?5, failed = ?6, skipped = ?7, run_status = ?8
             WHERE id = ?1",
            params![
                progress.last_run_id,
                progress.updated_at,
                progress.total,
                progress.attempted,
                progress.succeeded,
                progress.failed,
                progress.skipped,
                progress.run_status,
            ],
        )?;
        tx.execute(
            "INSERT INTO extraction_progress (competition_slug, season, total, attempted,
             succeeded, failed, skipped, run_status, last_run_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (competition_slug, season) DO UPDATE SET
                total = excluded.total,
                attempted = excluded.attempted,
                succeeded = excluded.succeeded,
                failed = excluded.failed,
                skipped = excluded.skipped,
                run_status = excluded.run_status,
                last_run_id = excluded.last_run_id,
                updated_at = excluded.updated_at",
            params![
                progress.competition_slug,
                progress.season,
                progress.total,
                progress.attempted,
                progress.succeeded,
                progress.failed,
                progress.skipped,
                progress.run_status,
                progress.last_run_id,
                progress.updated_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    })
}

pub fn find(
    db: &Database,
    competition_slug: &str,
    season: &str,
) -> Result<Option<ProgressRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM extraction_progress WHERE competition_slug = ?1 AND season = ?2",
                params![competition_slug, season],
                ProgressRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// All progress rows ordered by competition then season.
pub fn list_all(db: &Database) -> Result<Vec<ProgressRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM extraction_progress ORDER BY competition_slug, season",
        )?;
        let rows = stmt
            .query_map([], ProgressRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of extraction runs recorded for a scope.
pub fn count_runs(db: &Database, competition_slug: &str, season: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM extraction_runs WHERE competition_slug = ?1 AND season = ?2",
            params![competition_slug, season],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn progress(run_id: i64, succeeded: u32, status: &str) -> ProgressRow {
        ProgressRow {
            competition_slug: "la-liga".to_string(),
            season: "2024-25".to_string(),
            total: 10,
            attempted: succeeded + 1,
            succeeded,
            failed: 1,
            skipped: 10 - succeeded - 1,
            run_status: status.to_string(),
            last_run_id: run_id,
            updated_at: "2026-01-02T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_upsert_keeps_one_row_per_scope() {
        let db = test_db();
        let first = start_run(&db, "la-liga", "2024-25", "2026-01-01T00:00:00Z").unwrap();
        finish_run(&db, &progress(first, 3, "partial")).unwrap();
        let second = start_run(&db, "la-liga", "2024-25", "2026-01-02T00:00:00Z").unwrap();
        finish_run(&db, &progress(second, 9, "complete")).unwrap();

        let rows = list_all(&db).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].succeeded, 9);
        assert_eq!(rows[0].run_status, "complete");
        assert_eq!(rows[0].last_run_id, second);
        assert_eq!(count_runs(&db, "la-liga", "2024-25").unwrap(), 2);
    }

    #[test]
    fn test_finish_run_records_history() {
        let db = test_db();
        let run = start_run(&db, "la-liga", "2024-25", "2026-01-01T00:00:00Z").unwrap();
        finish_run(&db, &progress(run, 2, "aborted")).unwrap();

        let status: String = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT run_status FROM extraction_runs WHERE id = ?1",
                    params![run],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(status, "aborted");
    }

    #[test]
    fn test_find_missing_scope() {
        let db = test_db();
        assert!(find(&db, "serie-a", "2020-21").unwrap().is_none());
    }
}
