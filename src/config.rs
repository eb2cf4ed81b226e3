//! Configuration for the mood detector.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration, shared by the server and detection sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Period between detection ticks
    #[serde(with = "millis_serde")]
    pub poll_interval: Duration,

    /// Base URL of the record API that detection sessions persist to
    pub api_base_url: String,

    /// Location of the expression model assets
    pub model_path: PathBuf,

    /// Path for state and loop counters
    pub data_path: PathBuf,

    /// JSON-lines file holding persisted detections
    pub store_path: PathBuf,

    /// Port the HTTP server binds to
    pub server_port: u16,

    /// Default window for recent stats, in minutes
    pub recent_window_minutes: f64,

    /// Maximum records returned by an unfiltered listing
    pub list_limit: usize,

    /// Wait between model readiness checks at session start
    #[serde(with = "millis_serde")]
    pub model_retry_backoff: Duration,

    /// Readiness checks before a session start gives up
    pub model_retry_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mood-detector");

        Self {
            poll_interval: Duration::from_millis(200),
            api_base_url: "http://127.0.0.1:5000".to_string(),
            model_path: PathBuf::from("models"),
            store_path: data_dir.join("emotions.jsonl"),
            data_path: data_dir,
            server_port: 5000,
            recent_window_minutes: 60.0,
            list_limit: 100,
            model_retry_backoff: Duration::from_millis(500),
            model_retry_attempts: 20,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mood-detector")
            .join("config.json")
    }

    /// Path of the persisted loop counters.
    pub fn monitor_path(&self) -> PathBuf {
        self.data_path.join("monitor.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

/// Serde support for Duration as whole milliseconds.
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_millis(200));
        assert_eq!(config.recent_window_minutes, 60.0);
        assert_eq!(config.list_limit, 100);
        assert!(config.store_path.ends_with("emotions.jsonl"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"poll_interval": 250, "server_port": 8080}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.model_retry_attempts, 20);
    }

    #[test]
    fn test_config_roundtrip_keeps_millis() {
        let config = Config {
            model_retry_backoff: Duration::from_millis(750),
            ..Config::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["model_retry_backoff"], 750);
    }
}
