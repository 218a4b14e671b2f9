use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, info_span, warn};

use crate::config::{DataLayout, ExtractionSettings};
use crate::db::outcome_repo::{self, OutcomeRow};
use crate::db::{progress_repo, timestamp_now, Database};
use crate::index::{MatchIndex, MatchRecord, Scope};

use super::breaker::CircuitBreaker;
use super::error::{ExtractionError, FetchError, HttpErrorClass};
use super::progress::{export_progress_csv, ExtractionProgress, ExtractionRunStatus};
use super::retry::{fetch_with_retry, RetryPolicy, Sleeper};
use super::source::{MatchSource, COMPLETION_MARKER};
use super::writer::RawWriter;

pub const BREAKER_OPEN_DETAIL: &str = "circuit breaker open";
pub const INTERRUPTED_DETAIL: &str = "interrupted";

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Re-attempt matches that already have a successful outcome.
    pub force: bool,
    pub retry: RetryPolicy,
    /// Pause after each attempted match.
    pub match_delay: Duration,
    pub breaker_threshold: u32,
    /// Only consider the first `limit` in-scope matches.
    pub limit: Option<usize>,
}

impl ExtractionOptions {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            force: false,
            retry: RetryPolicy::from_settings(settings),
            match_delay: Duration::from_millis(settings.match_delay_ms),
            breaker_threshold: settings.breaker_threshold,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Success,
    Failed,
    Skipped,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Success => "success",
            MatchStatus::Failed => "failed",
            MatchStatus::Skipped => "skipped",
        }
    }
}

/// A match whose extraction failed in this run.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFailure {
    pub match_id: u64,
    pub error_class: HttpErrorClass,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub extraction_run_id: i64,
    pub progress: ExtractionProgress,
    pub failures: Vec<MatchFailure>,
    pub breaker_tripped: bool,
    pub interrupted: bool,
}

impl ExtractionReport {
    pub fn aborted(&self) -> bool {
        self.progress.run_status == ExtractionRunStatus::Aborted
    }
}

/// Counters and flags gathered while one scope is walked.
struct ScopeState {
    progress: ExtractionProgress,
    failures: Vec<MatchFailure>,
    breaker_tripped: bool,
    interrupted: bool,
}

impl ScopeState {
    fn new(scope: &Scope, total: u32) -> Self {
        Self {
            progress: ExtractionProgress::new(scope.clone(), total),
            failures: Vec::new(),
            breaker_tripped: false,
            interrupted: false,
        }
    }
}

/// Extracts raw match data scope by scope with retries and a circuit breaker.
pub struct ExtractionEngine<'a> {
    db: &'a Database,
    layout: &'a DataLayout,
    options: ExtractionOptions,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(db: &'a Database, layout: &'a DataLayout, options: ExtractionOptions) -> Self {
        Self {
            db,
            layout,
            options,
            cancel: None,
        }
    }

    /// Stops the run between matches once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// A match counts as extracted when its last attempt succeeded and the raw
    /// directory still carries the completion marker.
    pub fn is_extracted(&self, record: &MatchRecord) -> Result<bool, ExtractionError> {
        let last = outcome_repo::latest_attempt_for_match(self.db, record.match_id)?;
        let succeeded = last
            .map(|o| o.status == MatchStatus::Success.as_str())
            .unwrap_or(false);
        Ok(succeeded && RawWriter::new(self.layout).is_complete(record))
    }

    pub fn extract_scope(
        &self,
        index: &MatchIndex,
        scope: &Scope,
        source: &mut dyn MatchSource,
        sleeper: &dyn Sleeper,
    ) -> Result<ExtractionReport, ExtractionError> {
        let _span = info_span!("extract", scope = %scope, force = self.options.force).entered();

        let mut matches = index.in_scope(scope);
        if let Some(limit) = self.options.limit {
            matches.truncate(limit);
        }

        let run_id = progress_repo::start_run(
            self.db,
            &scope.competition_slug,
            &scope.season,
            &timestamp_now(),
        )?;
        info!(extraction_run_id = run_id, matches = matches.len(), "Extraction started");

        let mut state = ScopeState::new(scope, matches.len() as u32);
        if let Err(e) = self.extract_matches(run_id, &matches, source, sleeper, &mut state) {
            // Close the run row so it never stays `running`.
            error!(extraction_run_id = run_id, error = %e, "Extraction stopped by an engine error");
            state.progress.run_status = ExtractionRunStatus::Aborted;
            if let Err(finish_err) =
                progress_repo::finish_run(self.db, &state.progress.to_row(run_id, &timestamp_now()))
            {
                error!(error = %finish_err, "Could not mark extraction run aborted");
            }
            if let Err(export_err) = export_progress_csv(self.db, &self.layout.progress_csv_path()) {
                warn!(error = %export_err, "Could not refresh progress CSV");
            }
            return Err(e);
        }

        let ScopeState {
            mut progress,
            failures,
            breaker_tripped,
            interrupted,
        } = state;

        progress.run_status = if breaker_tripped || interrupted {
            ExtractionRunStatus::Aborted
        } else if progress.failed > 0 {
            ExtractionRunStatus::Partial
        } else {
            ExtractionRunStatus::Complete
        };

        progress_repo::finish_run(self.db, &progress.to_row(run_id, &timestamp_now()))?;
        export_progress_csv(self.db, &self.layout.progress_csv_path())?;

        info!(
            extraction_run_id = run_id,
            attempted = progress.attempted,
            succeeded = progress.succeeded,
            failed = progress.failed,
            skipped = progress.skipped,
            run_status = %progress.run_status,
            "Extraction finished"
        );

        Ok(ExtractionReport {
            extraction_run_id: run_id,
            progress,
            failures,
            breaker_tripped,
            interrupted,
        })
    }

    fn extract_matches(
        &self,
        run_id: i64,
        matches: &[&MatchRecord],
        source: &mut dyn MatchSource,
        sleeper: &dyn Sleeper,
        state: &mut ScopeState,
    ) -> Result<(), ExtractionError> {
        let writer = RawWriter::new(self.layout);
        let mut breaker = CircuitBreaker::new(self.options.breaker_threshold);

        for (pos, record) in matches.iter().enumerate() {
            if self.cancelled() {
                warn!(remaining = matches.len() - pos, "Extraction interrupted");
                state.interrupted = true;
                state.progress.skipped +=
                    self.skip_remaining(run_id, &matches[pos..], INTERRUPTED_DETAIL)?;
                break;
            }

            if !self.options.force && self.is_extracted(record)? {
                state.progress.skipped += 1;
                continue;
            }

            state.progress.attempted += 1;
            let _match_span = info_span!("extract_match", match_id = record.match_id).entered();
            let attempted = fetch_with_retry(source, record, &self.options.retry, sleeper);

            let stored = attempted
                .result
                .and_then(|raw| {
                    if raw.has_completion_marker() {
                        Ok(raw)
                    } else {
                        Err(FetchError::new(
                            HttpErrorClass::Decode,
                            "lineups",
                            format!("source returned no {}", COMPLETION_MARKER),
                        ))
                    }
                })
                .and_then(|raw| match writer.write(record, &raw) {
                    Ok(_) => Ok(raw),
                    Err(e) => Err(FetchError::new(HttpErrorClass::Storage, "raw", e.to_string())),
                });

            match stored {
                Ok(raw) => {
                    let detail = if raw.missing_optional.is_empty() {
                        None
                    } else {
                        Some(format!("missing optional: {}", raw.missing_optional.join(", ")))
                    };
                    self.record(run_id, record, MatchStatus::Success, None, attempted.attempts, detail)?;
                    breaker.record_success();
                    state.progress.succeeded += 1;
                }
                Err(err) => {
                    warn!(attempts = attempted.attempts, error = %err, "Match extraction failed");
                    self.record(
                        run_id,
                        record,
                        MatchStatus::Failed,
                        Some(err.class),
                        attempted.attempts,
                        Some(err.to_string()),
                    )?;
                    state.progress.failed += 1;
                    state.failures.push(MatchFailure {
                        match_id: record.match_id,
                        error_class: err.class,
                        attempts: attempted.attempts,
                        message: err.to_string(),
                    });

                    if breaker.record_failure() {
                        error!(
                            consecutive_failures = breaker.consecutive_failures(),
                            remaining = matches.len() - pos - 1,
                            "Circuit breaker open, aborting extraction"
                        );
                        state.breaker_tripped = true;
                        state.progress.skipped +=
                            self.skip_remaining(run_id, &matches[pos + 1..], BREAKER_OPEN_DETAIL)?;
                        break;
                    }
                }
            }

            if pos + 1 < matches.len() {
                sleeper.sleep(self.options.match_delay);
            }
        }
        Ok(())
    }

    fn skip_remaining(
        &self,
        run_id: i64,
        remaining: &[&MatchRecord],
        detail: &str,
    ) -> Result<u32, ExtractionError> {
        for record in remaining {
            self.record(run_id, record, MatchStatus::Skipped, None, 0, Some(detail.to_string()))?;
        }
        Ok(remaining.len() as u32)
    }

    fn record(
        &self,
        run_id: i64,
        record: &MatchRecord,
        status: MatchStatus,
        error_class: Option<HttpErrorClass>,
        attempts: u32,
        detail: Option<String>,
    ) -> Result<(), ExtractionError> {
        outcome_repo::insert(
            self.db,
            &OutcomeRow {
                id: 0,
                extraction_run_id: run_id,
                match_id: record.match_id,
                competition_slug: record.competition_slug.clone(),
                season: record.season.clone(),
                status: status.as_str().to_string(),
                http_error_class: error_class.map(HttpErrorClass::code),
                attempt_count: attempts,
                detail,
                recorded_at: timestamp_now(),
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::source::{RawFile, RawMatch};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    struct CountingSleeper(RefCell<Vec<Duration>>);

    impl Sleeper for CountingSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    /// Succeeds for every match not listed in `failing`.
    struct StubSource {
        failing: HashSet<u64>,
        calls: Vec<u64>,
    }

    impl StubSource {
        fn failing(ids: &[u64]) -> Self {
            Self {
                failing: ids.iter().copied().collect(),
                calls: Vec::new(),
            }
        }
    }

    impl MatchSource for StubSource {
        fn fetch(&mut self, record: &MatchRecord) -> Result<RawMatch, FetchError> {
            self.calls.push(record.match_id);
            if self.failing.contains(&record.match_id) {
                return Err(FetchError::new(HttpErrorClass::Client(404), "event", "not found"));
            }
            Ok(RawMatch {
                files: vec![
                    RawFile::new("event.json", "{}"),
                    RawFile::new("lineups.json", "{}"),
                ],
                missing_optional: vec!["statistics".to_string()],
            })
        }
    }

    fn index(n: u64) -> MatchIndex {
        let records = (1..=n)
            .map(|id| MatchRecord {
                match_id: id,
                competition_slug: "pl".to_string(),
                season: "2024-25".to_string(),
                realm: "club".to_string(),
                round: Some(id as u32),
                match_date: None,
                home_team_name: None,
                away_team_name: None,
            })
            .collect();
        MatchIndex::from_records(records).unwrap()
    }

    fn options(threshold: u32) -> ExtractionOptions {
        ExtractionOptions {
            force: false,
            retry: RetryPolicy {
                max_attempts: 2,
                base: Duration::ZERO,
                cap: Duration::ZERO,
            },
            match_delay: Duration::from_millis(250),
            breaker_threshold: threshold,
            limit: None,
        }
    }

    fn scope() -> Scope {
        Scope::new("pl", "2024-25")
    }

    #[test]
    fn test_failures_are_recorded_not_raised() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let db = Database::open_in_memory().unwrap();
        let engine = ExtractionEngine::new(&db, &layout, options(6));
        let mut source = StubSource::failing(&[2]);

        let report = engine
            .extract_scope(&index(3), &scope(), &mut source, &NoSleep)
            .unwrap();

        assert_eq!(report.progress.succeeded, 2);
        assert_eq!(report.progress.failed, 1);
        assert_eq!(report.progress.run_status, ExtractionRunStatus::Partial);
        assert_eq!(report.failures[0].match_id, 2);
        let failed = outcome_repo::latest_for_match(&db, 2).unwrap().unwrap();
        assert_eq!(failed.http_error_class.as_deref(), Some("http_404"));
        let ok = outcome_repo::latest_for_match(&db, 1).unwrap().unwrap();
        assert_eq!(ok.detail.as_deref(), Some("missing optional: statistics"));
        assert!(layout.progress_csv_path().exists());
    }

    #[test]
    fn test_delay_only_between_attempted_matches() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let db = Database::open_in_memory().unwrap();
        let engine = ExtractionEngine::new(&db, &layout, options(6));
        let sleeper = CountingSleeper(RefCell::new(vec![]));

        engine
            .extract_scope(&index(3), &scope(), &mut StubSource::failing(&[]), &sleeper)
            .unwrap();
        assert_eq!(sleeper.0.borrow().len(), 2);

        let second = CountingSleeper(RefCell::new(vec![]));
        let report = engine
            .extract_scope(&index(3), &scope(), &mut StubSource::failing(&[]), &second)
            .unwrap();
        assert_eq!(report.progress.skipped, 3);
        assert!(second.0.borrow().is_empty());
    }

    #[test]
    fn test_missing_marker_counts_as_failure() {
        struct NoLineups;
        impl MatchSource for NoLineups {
            fn fetch(&mut self, _record: &MatchRecord) -> Result<RawMatch, FetchError> {
                Ok(RawMatch {
                    files: vec![RawFile::new("event.json", "{}")],
                    missing_optional: vec![],
                })
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let db = Database::open_in_memory().unwrap();
        let engine = ExtractionEngine::new(&db, &layout, options(6));

        let report = engine
            .extract_scope(&index(1), &scope(), &mut NoLineups, &NoSleep)
            .unwrap();
        assert_eq!(report.progress.failed, 1);
        assert_eq!(report.failures[0].error_class, HttpErrorClass::Decode);
        assert!(!layout.raw_base.join("2024-25/club/pl/1").exists());
    }

    #[test]
    fn test_unwritable_raw_tree_is_recorded_per_match() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        // A plain file where the season directory belongs.
        std::fs::create_dir_all(&layout.raw_base).unwrap();
        std::fs::write(layout.raw_base.join("2024-25"), "not a directory").unwrap();
        let db = Database::open_in_memory().unwrap();
        let engine = ExtractionEngine::new(&db, &layout, options(6));

        let report = engine
            .extract_scope(&index(2), &scope(), &mut StubSource::failing(&[]), &NoSleep)
            .unwrap();

        assert_eq!(report.progress.attempted, 2);
        assert_eq!(report.progress.failed, 2);
        assert_eq!(report.progress.run_status, ExtractionRunStatus::Partial);
        assert!(report
            .failures
            .iter()
            .all(|f| f.error_class == HttpErrorClass::Storage));

        let outcome = outcome_repo::latest_for_match(&db, 1).unwrap().unwrap();
        assert_eq!(outcome.status, "failed");
        assert_eq!(outcome.http_error_class.as_deref(), Some("storage"));
        let row = progress_repo::find(&db, "pl", "2024-25").unwrap().unwrap();
        assert_eq!(row.run_status, "partial");
        assert_eq!(row.last_run_id, report.extraction_run_id);
        assert!(layout.progress_csv_path().exists());
        assert!(!engine.is_extracted(index(2).get(1).unwrap()).unwrap());
    }

    #[test]
    fn test_cancel_flag_stops_before_next_match() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let db = Database::open_in_memory().unwrap();
        let flag = AtomicBool::new(true);
        let engine = ExtractionEngine::new(&db, &layout, options(6)).with_cancel_flag(&flag);
        let mut source = StubSource::failing(&[]);

        let report = engine
            .extract_scope(&index(2), &scope(), &mut source, &NoSleep)
            .unwrap();

        assert!(source.calls.is_empty());
        assert!(report.interrupted);
        assert!(report.aborted());
        assert_eq!(report.progress.skipped, 2);
        let row = outcome_repo::latest_for_match(&db, 2).unwrap().unwrap();
        assert_eq!(row.detail.as_deref(), Some(INTERRUPTED_DETAIL));
    }

    #[test]
    fn test_limit_truncates_scope() {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::under(temp_dir.path());
        let db = Database::open_in_memory().unwrap();
        let mut opts = options(6);
        opts.limit = Some(2);
        let engine = ExtractionEngine::new(&db, &layout, opts);
        let mut source = StubSource::failing(&[]);

        let report = engine
            .extract_scope(&index(5), &scope(), &mut source, &NoSleep)
            .unwrap();
        assert_eq!(report.progress.total, 2);
        assert_eq!(source.calls, vec![1, 2]);
    }
}
