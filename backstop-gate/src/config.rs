use backstop_core::LimiterConfig;
use serde::{Deserialize, Serialize};

use crate::gate::DEFAULT_GREETING;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    pub listen: ListenConfig,
    pub limiter: LimiterConfig,
    pub greeting: String,
    /// When set, keys whose records have all expired are dropped on this period.
    /// Unset keeps every key for the life of the gate.
    pub sweep_interval_ms: Option<u64>,
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            limiter: LimiterConfig::default(),
            greeting: DEFAULT_GREETING.to_string(),
            sweep_interval_ms: None,
            max_request_bytes: 64 * 1024,
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
