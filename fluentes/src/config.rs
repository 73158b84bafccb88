//! Configuration for builders and logging
//!
//! Loaded from a TOML file; every section and key is optional.
//!
//! ```toml
//! [buckets]
//! group_by_size = 1000
//! top_hits_size = 5
//!
//! [percentiles]
//! percents = [50.0, 95.0, 99.0]
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Terms size that returns every distinct key
pub const UNBOUNDED_SIZE: u32 = i32::MAX as u32;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FluentConfig {
    #[serde(default)]
    pub buckets: BucketConfig,
    #[serde(default)]
    pub percentiles: PercentilesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BucketConfig {
    /// Terms size for group-by buckets (default: all keys)
    #[serde(default = "default_unbounded_size")]
    pub group_by_size: u32,
    /// Terms size for distinct-value buckets (default: all keys)
    #[serde(default = "default_unbounded_size")]
    pub distinct_size: u32,
    /// Hits kept by `top_hits_default`
    #[serde(default = "default_top_hits_size")]
    pub top_hits_size: u32,
}

fn default_unbounded_size() -> u32 {
    UNBOUNDED_SIZE
}

fn default_top_hits_size() -> u32 {
    10
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            group_by_size: default_unbounded_size(),
            distinct_size: default_unbounded_size(),
            top_hits_size: default_top_hits_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PercentilesConfig {
    /// Percents requested by `percentiles_by`; the engine default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percents: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Log output format: "pretty" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl FluentConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load config from file path, or fall back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FluentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.buckets.group_by_size == 0 || self.buckets.distinct_size == 0 {
            anyhow::bail!("bucket sizes must be positive");
        }
        if let Some(percents) = &self.percentiles.percents {
            if let Some(bad) = percents.iter().find(|p| !(0.0..=100.0).contains(*p)) {
                anyhow::bail!("percent {} is outside 0..=100", bad);
            }
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => anyhow::bail!("unknown log format '{}', expected pretty or json", other),
        }
    }
}
