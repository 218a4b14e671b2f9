use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ExtractionSettings;
use crate::index::MatchRecord;

use super::error::FetchError;
use super::source::{MatchSource, RawMatch};

/// Blocking pause between attempts and between matches.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Exponential backoff with a cap, no jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base: Duration::from_millis(settings.backoff_base_ms),
            cap: Duration::from_millis(settings.backoff_max_ms),
        }
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exp).min(self.cap)
    }
}

/// Result of fetching one match under a retry policy.
#[derive(Debug)]
pub struct Attempted {
    pub result: Result<RawMatch, FetchError>,
    pub attempts: u32,
}

/// Fetches `record`, retrying transient failures with backoff.
pub fn fetch_with_retry(
    source: &mut dyn MatchSource,
    record: &MatchRecord,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Attempted {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match source.fetch(record) {
            Ok(raw) => {
                return Attempted {
                    result: Ok(raw),
                    attempts,
                }
            }
            Err(err) if err.class.is_transient() && attempts < policy.max_attempts => {
                let delay = policy.delay_for(attempts);
                warn!(
                    match_id = record.match_id,
                    attempt = attempts,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Transient fetch failure, backing off"
                );
                sleeper.sleep(delay);
            }
            Err(err) => {
                debug!(match_id = record.match_id, attempts, error = %err, "Fetch failed");
                return Attempted {
                    result: Err(err),
                    attempts,
                };
            }
        }
    }
}
