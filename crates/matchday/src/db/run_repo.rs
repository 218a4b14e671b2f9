//! Pipeline run repository: one row per orchestrator invocation.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw `pipeline_runs` row. Step lists are stored as JSON arrays.
#[derive(Debug, Clone)]
pub struct RunRow {
    pub run_id: i64,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub steps_planned: String,
    pub steps_run: Option<String>,
    pub status: String,
    pub failed_step: Option<String>,
    pub env: String,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            run_id: row.get("run_id")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            steps_planned: row.get("steps_planned")?,
            steps_run: row.get("steps_run")?,
            status: row.get("status")?,
            failed_step: row.get("failed_step")?,
            env: row.get("env")?,
        })
    }
}

/// Inserts a `running` row and returns the new, monotonically increasing run id.
pub fn insert_running(
    db: &Database,
    started_at: &str,
    steps_planned: &str,
    env: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pipeline_runs (started_at, steps_planned, status, env)
             VALUES (?1, ?2, 'running', ?3)",
            params![started_at, steps_planned, env],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Moves a run from `running` to a terminal status in a single statement.
/// Returns the number of rows changed: 0 when the run is unknown or already finished.
pub fn finish(
    db: &Database,
    run_id: i64,
    ended_at: &str,
    steps_run: &str,
    status: &str,
    failed_step: Option<&str>,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE pipeline_runs SET ended_at = ?2, steps_run = ?3, status = ?4, failed_step = ?5
             WHERE run_id = ?1 AND status = 'running'",
            params![run_id, ended_at, steps_run, status, failed_step],
        )?;
        Ok(changed)
    })
}

pub fn find_by_id(db: &Database, run_id: i64) -> Result<Option<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM pipeline_runs WHERE run_id = ?1",
                params![run_id],
                RunRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Newest runs first.
pub fn list_recent(db: &Database, limit: u32) -> Result<Vec<RunRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM pipeline_runs ORDER BY run_id DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit], RunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Highest run id with the given status.
pub fn latest_with_status(db: &Database, status: &str) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let run_id: Option<i64> = conn.query_row(
            "SELECT MAX(run_id) FROM pipeline_runs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(run_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_run_ids_increase() {
        let db = test_db();
        let a = insert_running(&db, "2026-01-01T00:00:00Z", "[]", "dev").unwrap();
        let b = insert_running(&db, "2026-01-01T00:01:00Z", "[]", "dev").unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_finish_only_once() {
        let db = test_db();
        let id = insert_running(&db, "2026-01-01T00:00:00Z", "[\"00\"]", "dev").unwrap();

        assert_eq!(finish(&db, id, "2026-01-01T00:05:00Z", "[\"00\"]", "ok", None).unwrap(), 1);
        assert_eq!(
            finish(&db, id, "2026-01-01T00:06:00Z", "[]", "fail", Some("00")).unwrap(),
            0
        );

        let row = find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(row.status, "ok");
        assert_eq!(row.failed_step, None);
        assert_eq!(row.ended_at.as_deref(), Some("2026-01-01T00:05:00Z"));
    }

    #[test]
    fn test_list_recent_newest_first() {
        let db = test_db();
        for i in 0..5 {
            insert_running(&db, &format!("2026-01-0{}T00:00:00Z", i + 1), "[]", "dev").unwrap();
        }
        let rows = list_recent(&db, 3).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn test_latest_with_status() {
        let db = test_db();
        assert_eq!(latest_with_status(&db, "ok").unwrap(), None);
        let a = insert_running(&db, "t1", "[]", "dev").unwrap();
        finish(&db, a, "t2", "[]", "ok", None).unwrap();
        let b = insert_running(&db, "t3", "[]", "dev").unwrap();
        finish(&db, b, "t4", "[]", "fail", Some("02")).unwrap();
        assert_eq!(latest_with_status(&db, "ok").unwrap(), Some(a));
    }
}
