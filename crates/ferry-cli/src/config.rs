//! Server configuration types.

use anyhow::{bail, Context, Result};
use ferry_git::DEFAULT_PACK_WORKERS;
use ferry_storage::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for `ferry-upload-pack`, loaded from an optional YAML file.
///
/// Every field has a default, so a file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Compression workers used when writing the pack.
    pub pack_workers: usize,
    /// Capacity of each pooled I/O buffer, in bytes.
    pub buffer_size: usize,
    /// Buffers kept idle in the pool.
    pub max_idle_buffers: usize,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format: `pretty` or `json`.
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pack_workers: DEFAULT_PACK_WORKERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_idle_buffers: DEFAULT_MAX_IDLE,
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.pack_workers == 0 {
            bail!("pack_workers must be at least 1");
        }
        if self.buffer_size == 0 {
            bail!("buffer_size must be at least 1");
        }
        if !matches!(
            self.log_level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            bail!("unknown log_level {:?}", self.log_level);
        }
        if !matches!(self.log_format.to_lowercase().as_str(), "pretty" | "json") {
            bail!("unknown log_format {:?}", self.log_format);
        }
        Ok(())
    }
}
