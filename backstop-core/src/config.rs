use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sliding-window limits. Defaults: 3 requests per 30 seconds.
///
/// A zero window or zero capacity is a caller error and is not rejected here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimiterConfig {
    pub window_size_ms: u64,
    pub capacity: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_size_ms: 30 * 1000,
            capacity: 3,
        }
    }
}

/// Exponential backoff parameters. Defaults: 1000 ms doubling per retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub exponent: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            exponent: 2.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

pub fn save_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(value)?;
    std::fs::write(path, contents)?;
    Ok(())
}
