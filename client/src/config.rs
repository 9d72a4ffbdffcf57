//! Configuration management for the CLI.

use std::env;
use std::path::PathBuf;
use tally_engine::ClientConfig;

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Web App endpoint. Unset means every server action is refused.
    pub api_url: Option<String>,
    /// Directory holding the offline queue and the token
    pub data_dir: PathBuf,
    /// Repeat suppression window for scanned codes
    pub scan_cooldown_ms: u64,
    /// Maximum number of queued offline entries
    pub queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();

        let api_url = lookup("TALLY_API_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let data_dir = match lookup("TALLY_DATA_DIR").filter(|dir| !dir.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir().ok_or(ConfigError::NoDataDir)?,
        };

        let scan_cooldown_ms = match lookup("TALLY_SCAN_COOLDOWN_MS") {
            Some(raw) => {
                let parsed = raw.trim().parse::<u64>();
                parsed.map_err(|_| ConfigError::InvalidCooldown(raw))?
            }
            None => defaults.scanner.cooldown_ms,
        };

        let queue_capacity = match lookup("TALLY_QUEUE_CAPACITY") {
            Some(raw) => {
                let parsed = raw.trim().parse::<usize>();
                match parsed {
                    Ok(n) if n > 0 => n,
                    _ => return Err(ConfigError::InvalidQueueCapacity(raw)),
                }
            }
            None => defaults.queue_capacity,
        };

        Ok(Self {
            api_url,
            data_dir,
            scan_cooldown_ms,
            queue_capacity,
        })
    }

    /// Engine configuration with the overrides applied.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            queue_capacity: self.queue_capacity,
            ..ClientConfig::default()
        };
        config.scanner.cooldown_ms = self.scan_cooldown_ms;
        config
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|base| base.join("tally"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid TALLY_SCAN_COOLDOWN_MS value: {0}")]
    InvalidCooldown(String),

    #[error("Invalid TALLY_QUEUE_CAPACITY value: {0}")]
    InvalidQueueCapacity(String),

    #[error("No data directory found; set TALLY_DATA_DIR")]
    NoDataDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("TALLY_DATA_DIR", "/tmp/tally")])).unwrap();

        assert_eq!(config.api_url, None);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/tally"));
        assert_eq!(config.scan_cooldown_ms, 1500);
        assert_eq!(config.queue_capacity, 50);
    }

    #[test]
    fn overrides_flow_into_engine_config() {
        let config = Config::from_lookup(lookup(&[
            ("TALLY_API_URL", " https://script.example.com/exec "),
            ("TALLY_DATA_DIR", "/tmp/tally"),
            ("TALLY_SCAN_COOLDOWN_MS", "900"),
            ("TALLY_QUEUE_CAPACITY", "20"),
        ]))
        .unwrap();

        assert_eq!(config.api_url.as_deref(), Some("https://script.example.com/exec"));
        let engine = config.client_config();
        assert_eq!(engine.queue_capacity, 20);
        assert_eq!(engine.scanner.cooldown_ms, 900);
        assert_eq!(engine.scanner.torch_probe_attempts, 10);
    }

    #[test]
    fn blank_api_url_is_unset() {
        let config = Config::from_lookup(lookup(&[
            ("TALLY_API_URL", "   "),
            ("TALLY_DATA_DIR", "/tmp/tally"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TALLY_DATA_DIR", "/tmp/tally"),
            ("TALLY_SCAN_COOLDOWN_MS", "soon"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidCooldown("soon".into()));

        let err = Config::from_lookup(lookup(&[
            ("TALLY_DATA_DIR", "/tmp/tally"),
            ("TALLY_QUEUE_CAPACITY", "0"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidQueueCapacity("0".into()));
    }
}
