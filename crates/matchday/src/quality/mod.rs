//! Data quality gate.
//!
//! A registry of named checks over the built artifact set. Every check
//! returns a structured [`DqCheckResult`]; check failures are data, never
//! errors. The gate verdict is the most severe result.

pub mod checks;

use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::DataLayout;
use crate::db::check_repo::CheckRow;
use crate::error::StorageError;
use crate::index::MatchIndex;
use crate::pipeline::StepChain;
use crate::storage::filesystem::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Pass,
    Warn,
    Fail,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Pass => "PASS",
            Severity::Warn => "WARN",
            Severity::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation shown for checks that passed.
pub const NO_ACTION: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqCheckResult {
    pub check_name: String,
    pub severity: Severity,
    pub message: String,
    pub remediation_hint: Option<String>,
}

impl DqCheckResult {
    pub fn pass(check_name: &str, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            severity: Severity::Pass,
            message: message.into(),
            remediation_hint: Some(NO_ACTION.to_string()),
        }
    }

    pub fn warn(check_name: &str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            severity: Severity::Warn,
            message: message.into(),
            remediation_hint: Some(hint.into()),
        }
    }

    pub fn fail(check_name: &str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            severity: Severity::Fail,
            message: message.into(),
            remediation_hint: Some(hint.into()),
        }
    }
}

/// Results of one gate (`dq` or `validate`) for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub gate: String,
    pub results: Vec<DqCheckResult>,
}

impl GateReport {
    pub fn new(gate: &str, results: Vec<DqCheckResult>) -> Self {
        Self {
            gate: gate.to_string(),
            results,
        }
    }

    /// FAIL if any check failed, else WARN if any warned, else PASS.
    pub fn verdict(&self) -> Severity {
        self.results
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or(Severity::Pass)
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &DqCheckResult> {
        self.results.iter().filter(move |r| r.severity == severity)
    }

    pub fn get(&self, check_name: &str) -> Option<&DqCheckResult> {
        self.results.iter().find(|r| r.check_name == check_name)
    }

    pub fn to_rows(&self, run_id: i64, recorded_at: &str) -> Vec<CheckRow> {
        self.results
            .iter()
            .map(|r| CheckRow {
                run_id,
                gate: self.gate.clone(),
                check_name: r.check_name.clone(),
                severity: r.severity.as_str().to_string(),
                message: r.message.clone(),
                remediation_hint: r.remediation_hint.clone(),
                recorded_at: recorded_at.to_string(),
            })
            .collect()
    }
}

/// Everything a check may look at.
pub struct CheckContext<'a> {
    pub layout: &'a DataLayout,
    pub index: &'a MatchIndex,
    pub chain: &'a StepChain,
    pub now: SystemTime,
    pub freshness: Duration,
}

pub trait DqCheck: Send + Sync {
    fn name(&self) -> String;

    fn run(&self, ctx: &CheckContext<'_>) -> DqCheckResult;
}

#[derive(Default)]
pub struct DqRegistry {
    checks: Vec<Box<dyn DqCheck>>,
}

impl DqRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, check: Box<dyn DqCheck>) {
        self.checks.push(check);
    }

    /// The standard check set, in reporting order.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for check in checks::standard_checks() {
            registry.register(check);
        }
        registry
    }

    pub fn names(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn run(&self, ctx: &CheckContext<'_>) -> GateReport {
        let results = self
            .checks
            .iter()
            .map(|check| {
                let result = check.run(ctx);
                tracing::debug!(
                    check = %result.check_name,
                    severity = %result.severity,
                    "DQ check evaluated"
                );
                result
            })
            .collect();
        GateReport::new("dq", results)
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    run_id: i64,
    generated_at: String,
    verdict: Severity,
    checks: &'a [DqCheckResult],
}

/// Writes the machine-readable gate report next to the processed tables.
pub fn write_report(path: &Path, run_id: i64, report: &GateReport) -> Result<(), StorageError> {
    let file = ReportFile {
        run_id,
        generated_at: crate::db::timestamp_now(),
        verdict: report.verdict(),
        checks: &report.results,
    };
    let payload = serde_json::to_vec_pretty(&file).map_err(|e| StorageError::Json {
        path: path.to_path_buf(),
        line: 0,
        source: e,
    })?;
    write_atomic(path, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verdict_is_most_severe() {
        let mut report = GateReport::new("dq", vec![DqCheckResult::pass("a", "ok")]);
        assert_eq!(report.verdict(), Severity::Pass);

        report.results.push(DqCheckResult::warn("b", "meh", "rerun"));
        assert_eq!(report.verdict(), Severity::Warn);

        report.results.push(DqCheckResult::fail("c", "bad", "rerun"));
        assert_eq!(report.verdict(), Severity::Fail);
        assert_eq!(report.with_severity(Severity::Warn).count(), 1);

        assert_eq!(GateReport::new("dq", Vec::new()).verdict(), Severity::Pass);
    }

    #[test]
    fn test_rows_carry_gate_and_hint() {
        let report = GateReport::new(
            "dq",
            vec![
                DqCheckResult::fail("x", "broken", "rerun pipeline from step 00"),
                DqCheckResult::pass("y", "fine"),
            ],
        );
        let rows = report.to_rows(7, "2025-01-01T00:00:00Z");
        assert_eq!(rows[0].run_id, 7);
        assert_eq!(rows[0].severity, "FAIL");
        assert_eq!(
            rows[0].remediation_hint.as_deref(),
            Some("rerun pipeline from step 00")
        );
        assert_eq!(rows[1].remediation_hint.as_deref(), Some(NO_ACTION));
    }

    #[test]
    fn test_report_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("processed/dq_report.json");
        let report = GateReport::new("dq", vec![DqCheckResult::warn("v", "drift", "rerun")]);
        write_report(&path, 3, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["run_id"], 3);
        assert_eq!(value["verdict"], "WARN");
        assert_eq!(value["checks"][0]["check_name"], "v");
    }
}
