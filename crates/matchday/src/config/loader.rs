use std::path::{Path, PathBuf};

use crate::config::schema::Settings;
use crate::error::ConfigError;

/// Prefix for environment overrides, e.g. `MATCHDAY_RAW_BASE`.
pub const ENV_PREFIX: &str = "MATCHDAY_";

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = if content.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_settings(&settings)?;

    Ok(settings)
}

/// Loads settings for a project root: an explicit file if given, otherwise the
/// first existing candidate, otherwise defaults. Environment overrides are
/// applied last.
pub fn resolve_settings(root: &Path, explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match explicit {
        Some(path) => load_settings(path)?,
        None => match config_candidates(root).into_iter().find(|p| p.is_file()) {
            Some(path) => {
                log::debug!("Using config file {}", path.display());
                load_settings(path)?
            }
            None => Settings::default(),
        },
    };

    apply_env_overrides(&mut settings)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Config files searched when none is given explicitly.
pub fn config_candidates(root: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![root.join("config").join("env.yaml")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("matchday").join("config.yaml"));
    }
    candidates
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue {
                name: format!("{}{}", ENV_PREFIX, name),
                value,
            }),
        None => Ok(None),
    }
}

/// Applies `MATCHDAY_*` environment variables on top of file settings.
/// Empty values are ignored.
pub fn apply_env_overrides(settings: &mut Settings) -> Result<(), ConfigError> {
    let paths = &mut settings.paths;
    let string_overrides: [(&str, &mut String); 8] = [
        ("ENV", &mut settings.env),
        ("API_BASE", &mut settings.api_base),
        ("RAW_BASE", &mut paths.raw_base),
        ("INDEX_PATH", &mut paths.index_path),
        ("DERIVED_DIR", &mut paths.derived_dir),
        ("PROCESSED_DIR", &mut paths.processed_dir),
        ("INDEX_DIR", &mut paths.index_dir),
        ("LOG_DIR", &mut paths.log_dir),
    ];
    for (name, slot) in string_overrides {
        if let Some(value) = env_var(name) {
            *slot = value;
        }
    }

    if let Some(delay) = env_number("MATCH_DELAY_MS")? {
        settings.extraction.match_delay_ms = delay;
    }
    if let Some(threshold) = env_number("BREAKER_THRESHOLD")? {
        settings.extraction.breaker_threshold = threshold;
    }
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if settings.env.trim().is_empty() {
        errors.push("env must not be empty".to_string());
    }
    if settings.api_base.trim().is_empty() {
        errors.push("api_base must not be empty".to_string());
    }
    if settings.extraction.max_attempts == 0 {
        errors.push("extraction.max_attempts must be at least 1".to_string());
    }
    if settings.extraction.breaker_threshold == 0 {
        errors.push("extraction.breaker_threshold must be at least 1".to_string());
    }
    if settings.extraction.backoff_max_ms < settings.extraction.backoff_base_ms {
        errors.push("extraction.backoff_max_ms must not be below backoff_base_ms".to_string());
    }
    if settings.quality.freshness_hours == 0 {
        errors.push("quality.freshness_hours must be at least 1".to_string());
    }
    let fraction = settings.validation.max_row_drop_fraction;
    if !(fraction > 0.0 && fraction <= 1.0) {
        errors.push(format!(
            "validation.max_row_drop_fraction must be in (0, 1], got {}",
            fraction
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            message: errors.join("; "),
        })
    }
}
