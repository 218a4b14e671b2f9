//! Validation layer: structural checks independent of DQ semantics.
//!
//! Every table must carry its required columns with the expected types, and
//! must not have collapsed in size compared with the latest successful run.
//! Every finding is a FAIL.

pub mod schema;

use std::path::Path;

use serde_json::Value;

use crate::config::DataLayout;
use crate::ledger::LatestSuccessPointer;
use crate::pipeline::error::rerun_hint;
use crate::pipeline::{Artifact, StepChain};
use crate::quality::{DqCheckResult, GateReport};
use crate::storage::table::{read_columns, read_rows, Row, TableFormat};

pub use schema::{standard_schemas, ArtifactSchema, ColumnSpec, ColumnType};

/// Problems listed per check before truncating.
const MAX_PROBLEMS: usize = 5;

pub struct Validator<'a> {
    layout: &'a DataLayout,
    chain: &'a StepChain,
    schemas: Vec<ArtifactSchema>,
    max_row_drop_fraction: f64,
}

impl<'a> Validator<'a> {
    pub fn new(layout: &'a DataLayout, chain: &'a StepChain, max_row_drop_fraction: f64) -> Self {
        Self {
            layout,
            chain,
            schemas: standard_schemas(),
            max_row_drop_fraction,
        }
    }

    fn hint(&self, artifact: Artifact) -> String {
        let producer = self.chain.producer_id(artifact);
        rerun_hint(producer, producer)
    }

    /// Validates every schema; row counts are compared with `previous` when given.
    pub fn validate(&self, previous: Option<&LatestSuccessPointer>) -> GateReport {
        let mut results = Vec::new();
        for schema in &self.schemas {
            let path = schema.artifact.path(self.layout);
            let rows = match self.load(schema.artifact, &path) {
                Ok(rows) => rows,
                Err(result) => {
                    results.push(result);
                    continue;
                }
            };
            results.push(self.check_schema(schema, &path, &rows));
            if let Some(pointer) = previous {
                if let Some(result) = self.check_row_count(schema.artifact, rows.len(), pointer) {
                    results.push(result);
                }
            }
        }
        GateReport::new("validate", results)
    }

    fn load(&self, artifact: Artifact, path: &Path) -> Result<Vec<Row>, DqCheckResult> {
        let name = format!("schema:{}", artifact);
        if !path.is_file() {
            return Err(DqCheckResult::fail(
                &name,
                format!("{} is missing at {}", artifact, path.display()),
                self.hint(artifact),
            ));
        }
        read_rows(path).map_err(|e| {
            DqCheckResult::fail(
                &name,
                format!("{} is unreadable: {}", artifact, e),
                self.hint(artifact),
            )
        })
    }

    fn check_schema(&self, schema: &ArtifactSchema, path: &Path, rows: &[Row]) -> DqCheckResult {
        let name = format!("schema:{}", schema.artifact);
        let text = TableFormat::from_path(path) == TableFormat::Csv;
        if rows.is_empty() {
            return self.check_empty(schema, &name, path, text);
        }

        let mut problems = Vec::new();
        for column in &schema.columns {
            if !rows[0].contains_key(column.name) {
                problems.push(format!("missing column {}", column.name));
                continue;
            }

            let mut nulls = 0;
            let mut mismatches = 0;
            for row in rows {
                match row.get(column.name) {
                    None | Some(Value::Null) => nulls += 1,
                    Some(Value::String(cell)) if text => {
                        if !column.ty.accepts_text(cell) {
                            mismatches += 1;
                        }
                    }
                    Some(value) => {
                        if !column.ty.accepts_json(value) {
                            mismatches += 1;
                        }
                    }
                }
            }
            if nulls > 0 && !column.nullable {
                problems.push(format!("{} null(s) in {}", nulls, column.name));
            }
            if mismatches > 0 {
                problems.push(format!(
                    "{} value(s) in {} are not {}",
                    mismatches,
                    column.name,
                    column.ty.as_str()
                ));
            }
        }

        if problems.is_empty() {
            DqCheckResult::pass(
                &name,
                format!("{} rows, {} columns ok", rows.len(), schema.columns.len()),
            )
        } else {
            let total = problems.len();
            problems.truncate(MAX_PROBLEMS);
            let mut message = problems.join("; ");
            if total > MAX_PROBLEMS {
                message.push_str(&format!("; ... ({} more)", total - MAX_PROBLEMS));
            }
            DqCheckResult::fail(&name, message, self.hint(schema.artifact))
        }
    }

    /// Empty JSON Lines files carry no columns. An empty CSV may still carry a
    /// header, which must list every required column.
    fn check_empty(&self, schema: &ArtifactSchema, name: &str, path: &Path, text: bool) -> DqCheckResult {
        if !text {
            return DqCheckResult::pass(name, "0 rows");
        }
        let header = match read_columns(path) {
            Ok(header) => header,
            Err(e) => {
                return DqCheckResult::fail(
                    name,
                    format!("{} is unreadable: {}", schema.artifact, e),
                    self.hint(schema.artifact),
                )
            }
        };
        if header.is_empty() {
            return DqCheckResult::pass(name, "0 rows, no header");
        }

        let missing: Vec<&str> = schema
            .columns
            .iter()
            .map(|c| c.name)
            .filter(|c| !header.iter().any(|h| h == c))
            .collect();
        if missing.is_empty() {
            DqCheckResult::pass(name, format!("0 rows, header has {} columns", header.len()))
        } else {
            DqCheckResult::fail(
                name,
                format!("0 rows; header is missing column(s) {}", missing.join(", ")),
                self.hint(schema.artifact),
            )
        }
    }

    fn check_row_count(
        &self,
        artifact: Artifact,
        rows: usize,
        pointer: &LatestSuccessPointer,
    ) -> Option<DqCheckResult> {
        let previous = pointer.artifacts.get(artifact.name())?.rows;
        let name = format!("row_count:{}", artifact);
        let floor = previous as f64 * (1.0 - self.max_row_drop_fraction);
        let message = format!(
            "{} rows now, {} in run {}",
            rows, previous, pointer.run_id
        );

        if previous > 0 && (rows as f64) < floor {
            Some(DqCheckResult::fail(&name, message, self.hint(artifact)))
        } else {
            Some(DqCheckResult::pass(&name, message))
        }
    }
}
