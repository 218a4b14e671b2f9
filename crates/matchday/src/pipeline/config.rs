use std::path::Path;
use std::time::Duration;

use crate::config::{DataLayout, Settings};
use crate::extraction::ExtractionOptions;

/// Resolved, immutable inputs of an orchestrator run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: DataLayout,
    pub env: String,
    pub api_base: String,
    pub extraction: ExtractionOptions,
    pub request_timeout: Duration,
    pub freshness: Duration,
    pub max_row_drop_fraction: f64,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings, root: &Path) -> Self {
        Self {
            layout: DataLayout::resolve(root, &settings.paths),
            env: settings.env.clone(),
            api_base: settings.api_base.clone(),
            extraction: ExtractionOptions::from_settings(&settings.extraction),
            request_timeout: Duration::from_secs(settings.extraction.request_timeout_secs),
            freshness: Duration::from_secs(settings.quality.freshness_hours * 3600),
            max_row_drop_fraction: settings.validation.max_row_drop_fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_settings() {
        let config = PipelineConfig::from_settings(&Settings::default(), Path::new("/srv/md"));
        assert_eq!(config.layout.raw_base, Path::new("/srv/md/data/raw"));
        assert_eq!(config.env, "dev");
        assert_eq!(config.extraction.breaker_threshold, 6);
        assert_eq!(config.freshness, Duration::from_secs(48 * 3600));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(!config.extraction.force);
    }
}
