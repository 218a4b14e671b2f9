use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub quality: QualitySettings,
    #[serde(default)]
    pub validation: ValidationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: default_env(),
            api_base: default_api_base(),
            paths: PathSettings::default(),
            extraction: ExtractionSettings::default(),
            quality: QualitySettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_api_base() -> String {
    "https://api.sofascore.com/api/v1".to_string()
}

/// Data roots, relative to the project root unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    #[serde(default = "default_index_path")]
    pub index_path: String,
    #[serde(default = "default_derived_dir")]
    pub derived_dir: String,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: String,
    #[serde(default = "default_index_dir")]
    pub index_dir: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_raw_base() -> String {
    "data/raw".to_string()
}

fn default_index_path() -> String {
    "data/index/matches.csv".to_string()
}

fn default_derived_dir() -> String {
    "data/derived".to_string()
}

fn default_processed_dir() -> String {
    "data/processed".to_string()
}

fn default_index_dir() -> String {
    "data/index".to_string()
}

fn default_log_dir() -> String {
    "data/logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            raw_base: default_raw_base(),
            index_path: default_index_path(),
            derived_dir: default_derived_dir(),
            processed_dir: default_processed_dir(),
            index_dir: default_index_dir(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Pause between distinct matches.
    #[serde(default = "default_match_delay_ms")]
    pub match_delay_ms: u64,
    /// Attempts per match, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Consecutive failed matches that abort the run.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_match_delay_ms() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_base_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    12_000
}

fn default_breaker_threshold() -> u32 {
    6
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            match_delay_ms: default_match_delay_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            breaker_threshold: default_breaker_threshold(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySettings {
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: u64,
}

fn default_freshness_hours() -> u64 {
    48
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            freshness_hours: default_freshness_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Largest tolerated row-count drop versus the last promoted run, as a fraction.
    #[serde(default = "default_max_row_drop_fraction")]
    pub max_row_drop_fraction: f64,
}

fn default_max_row_drop_fraction() -> f64 {
    0.5
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_row_drop_fraction: default_max_row_drop_fraction(),
        }
    }
}
