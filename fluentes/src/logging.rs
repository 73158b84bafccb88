//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events; applications that have no
//! subscriber of their own can install one from [`LoggingConfig`].

use crate::config::LoggingConfig;
use anyhow::{anyhow, bail, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this when a subscriber
/// is already installed is not an error; the return value tells whether this
/// call installed one.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow!("invalid log level '{}': {}", config.level, e))?;

    let result = match config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        "pretty" => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        other => bail!("unknown log format '{}', expected pretty or json", other),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(result.is_ok())
}
