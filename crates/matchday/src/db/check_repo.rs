//! Gate check results (`check_results`), one row per (run, gate, check).

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckRow {
    pub run_id: i64,
    pub gate: String,
    pub check_name: String,
    pub severity: String,
    pub message: String,
    pub remediation_hint: Option<String>,
    pub recorded_at: String,
}

impl CheckRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            run_id: row.get("run_id")?,
            gate: row.get("gate")?,
            check_name: row.get("check_name")?,
            severity: row.get("severity")?,
            message: row.get("message")?,
            remediation_hint: row.get("remediation_hint")?,
            recorded_at: row.get("recorded_at")?,
        })
    }
}

/// Inserts all rows in one transaction.
pub fn insert_many(db: &Database, rows: &[CheckRow]) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO check_results (run_id, gate, check_name, severity, message,
                 remediation_hint, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.run_id,
                    row.gate,
                    row.check_name,
                    row.severity,
                    row.message,
                    row.remediation_hint,
                    row.recorded_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
}

pub fn list_for_run(
    db: &Database,
    run_id: i64,
    gate: Option<&str>,
) -> Result<Vec<CheckRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM check_results
             WHERE run_id = ?1 AND (?2 IS NULL OR gate = ?2)
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![run_id, gate], CheckRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
