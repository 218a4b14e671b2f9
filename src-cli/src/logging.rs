//! Tracing setup for the `matchday` binary.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "matchday=info";
const VERBOSE_LOG_FILTER: &str = "matchday=debug";

pub struct LogConfig {
    pub verbose: bool,
    pub json: bool,
}

/// Installs a stderr subscriber, human-readable or JSON. `RUST_LOG` wins over
/// the defaults. Records from the `log` facade are bridged in.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let default = if config.verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed()
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layer))
        .context("Failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().context("Failed to bridge log records into tracing")?;
    Ok(())
}
