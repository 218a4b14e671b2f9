//! Tabular artifact I/O.
//!
//! Canonical tables are JSON Lines (one typed object per row); flat-text
//! mirrors are CSV with a header row. Every write goes through
//! [`write_atomic`](super::filesystem::write_atomic).

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::filesystem::write_atomic;
use crate::error::StorageError;

/// A schema-agnostic table row, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    JsonLines,
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => TableFormat::Csv,
            _ => TableFormat::JsonLines,
        }
    }
}

pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<usize, StorageError> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record).map_err(|e| StorageError::Json {
            path: path.to_path_buf(),
            line: 0,
            source: e,
        })?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)?;
    Ok(records.len())
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| StorageError::Json {
            path: path.to_path_buf(),
            line: idx + 1,
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<usize, StorageError> {
    let csv_err = |e: csv::Error| StorageError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    let buf = writer
        .into_inner()
        .map_err(|e| csv_err(csv::Error::from(e.into_error())))?;
    write_atomic(path, &buf)?;
    Ok(records.len())
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let csv_err = |e: csv::Error| StorageError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err)
}

/// Reads a CSV file as untyped rows. Empty cells become `null`, everything
/// else stays a string.
fn read_csv_rows(path: &Path) -> Result<Vec<Row>, StorageError> {
    let csv_err = |e: csv::Error| StorageError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (h.to_string(), value)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Column names of a table: the CSV header, or the union of keys over all
/// JSON Lines rows in first-seen order.
pub fn read_columns(path: &Path) -> Result<Vec<String>, StorageError> {
    match TableFormat::from_path(path) {
        TableFormat::Csv => {
            let mut reader = csv::Reader::from_path(path).map_err(|e| StorageError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            let headers = reader.headers().map_err(|e| StorageError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(headers.iter().map(str::to_string).collect())
        }
        TableFormat::JsonLines => {
            let mut columns: Vec<String> = Vec::new();
            for row in read_jsonl::<Row>(path)? {
                for key in row.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
            Ok(columns)
        }
    }
}

/// Reads any table artifact as untyped rows, dispatching on the file extension.
pub fn read_rows(path: &Path) -> Result<Vec<Row>, StorageError> {
    match TableFormat::from_path(path) {
        TableFormat::Csv => read_csv_rows(path),
        TableFormat::JsonLines => read_jsonl(path),
    }
}

pub fn count_rows(path: &Path) -> Result<usize, StorageError> {
    match TableFormat::from_path(path) {
        TableFormat::Csv => {
            let mut reader = csv::Reader::from_path(path).map_err(|e| StorageError::Csv {
                path: path.to_path_buf(),
                source: e,
            })?;
            let mut count = 0;
            for record in reader.records() {
                record.map_err(|e| StorageError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                count += 1;
            }
            Ok(count)
        }
        TableFormat::JsonLines => {
            let content = std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(content.lines().filter(|l| !l.trim().is_empty()).count())
        }
    }
}

/// Reads an integer-like cell. CSV cells arrive as strings.
pub fn cell_u64(row: &Row, column: &str) -> Option<u64> {
    match row.get(column)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn cell_i64(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn cell_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

pub fn cell_f64(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Booleans from JSON, or `true`/`false` text from CSV mirrors.
pub fn cell_bool(row: &Row, column: &str) -> Option<bool> {
    match row.get(column)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Score {
        match_id: u64,
        home_team: String,
        home_score: Option<u32>,
    }

    fn sample() -> Vec<Score> {
        vec![
            Score {
                match_id: 1,
                home_team: "Arsenal".to_string(),
                home_score: Some(2),
            },
            Score {
                match_id: 2,
                home_team: "Chelsea".to_string(),
                home_score: None,
            },
        ]
    }

    #[test]
    fn test_jsonl_keeps_types() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scores.jsonl");
        write_jsonl(&path, &sample()).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["match_id"], Value::from(1u64));
        assert_eq!(rows[1]["home_score"], Value::Null);
        assert_eq!(read_jsonl::<Score>(&path).unwrap(), sample());
    }

    #[test]
    fn test_csv_rows_are_strings_and_nulls() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scores.csv");
        write_csv(&path, &sample()).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows[0]["match_id"], Value::String("1".to_string()));
        assert_eq!(rows[1]["home_score"], Value::Null);
        assert_eq!(cell_u64(&rows[0], "match_id"), Some(1));
        assert_eq!(count_rows(&path).unwrap(), 2);
    }

    #[test]
    fn test_read_columns() {
        let temp_dir = TempDir::new().unwrap();
        let jsonl = temp_dir.path().join("scores.jsonl");
        let csv = temp_dir.path().join("scores.csv");
        write_jsonl(&jsonl, &sample()).unwrap();
        write_csv(&csv, &sample()).unwrap();

        let expected = vec!["match_id", "home_team", "home_score"];
        assert_eq!(read_columns(&jsonl).unwrap(), expected);
        assert_eq!(read_columns(&csv).unwrap(), expected);
    }

    #[test]
    fn test_malformed_jsonl_reports_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"a\":1}\nnot json\n").unwrap();

        match read_rows(&path) {
            Err(StorageError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected Json error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_jsonl_counts_zero() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.jsonl");
        write_jsonl::<Score>(&path, &[]).unwrap();
        assert_eq!(count_rows(&path).unwrap(), 0);
        assert!(read_columns(&path).unwrap().is_empty());
    }
}
