use std::path::Path;

use backstop_core::{load_toml, save_toml};
use backstop_gate::GateConfig;
use backstop_web::ClientConfig;
use serde::{Deserialize, Serialize};

/// On-disk settings shared by `serve` and `call`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackstopConfig {
    pub gate: GateConfig,
    pub client: ClientConfig,
}

impl BackstopConfig {
    pub fn load_or_create(path: &Path) -> Result<Self, String> {
        if path.exists() {
            load_toml(path).map_err(|err| err.to_string())
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        save_toml(self, path).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backstop.toml");

        let config = BackstopConfig::load_or_create(&path).unwrap();
        assert_eq!(config, BackstopConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn keeps_saved_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backstop.toml");
        let mut config = BackstopConfig::default();
        config.gate.listen.port = 9090;
        config.gate.limiter.capacity = 10;
        config.gate.sweep_interval_ms = Some(60_000);
        config.client.backoff.exponent = 1.25;
        config.save(&path).unwrap();

        let loaded = BackstopConfig::load_or_create(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backstop.toml");
        std::fs::write(&path, "[gate\nport = 1").unwrap();

        assert!(BackstopConfig::load_or_create(&path).is_err());
    }
}
