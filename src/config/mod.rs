//! # Configuration Management Module
//!
//! TOML configuration for the questline engine and its CLI.
//!
//! ## Configuration Structure
//!
//! - [`StorageConfig`] - Where quest and region records are kept
//! - [`QuestsConfig`] - Quest naming and re-acceptance policy
//! - [`RequestsConfig`] - Capacity and lifetime of pending prompts
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use questline::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("questline.toml").await?;
//!     let config = Config::load("questline.toml").await?;
//!     println!("Prompts expire after {}s", config.requests.ttl_seconds);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data/questline"
//!
//! [quests]
//! repeatable_by_default = false
//! max_name_length = 32
//!
//! [requests]
//! capacity = 20
//! ttl_seconds = 30
//! sweep_interval_ms = 1000
//!
//! [logging]
//! level = "info"
//! file = "questline.log"
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::validation::DEFAULT_QUEST_NAME_MAX;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/questline".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestsConfig {
    /// Whether newly declared quests may be accepted again after completion.
    #[serde(default)]
    pub repeatable_by_default: bool,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

fn default_max_name_length() -> usize {
    DEFAULT_QUEST_NAME_MAX
}

impl Default for QuestsConfig {
    fn default() -> Self {
        Self {
            repeatable_by_default: false,
            max_name_length: default_max_name_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestsConfig {
    /// Maximum number of pending prompts; the oldest is dropped beyond this.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How long a prompt stays answerable.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// How often the background sweep looks for expired prompts.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_capacity() -> usize {
    20
}

fn default_ttl_seconds() -> u64 {
    30
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_seconds: default_ttl_seconds(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl RequestsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("questline.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub quests: QuestsConfig,
    #[serde(default)]
    pub requests: RequestsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.quests.max_name_length == 0 {
            return Err(anyhow!("quests.max_name_length must be greater than 0"));
        }
        if self.requests.capacity == 0 {
            return Err(anyhow!("requests.capacity must be greater than 0"));
        }
        if self.requests.ttl_seconds == 0 {
            return Err(anyhow!("requests.ttl_seconds must be greater than 0"));
        }
        if self.requests.sweep_interval_ms == 0 {
            return Err(anyhow!("requests.sweep_interval_ms must be greater than 0"));
        }
        let max_sweep_ms = self.requests.ttl_seconds.saturating_mul(1000) / 4;
        if self.requests.sweep_interval_ms > max_sweep_ms {
            return Err(anyhow!(
                "requests.sweep_interval_ms ({}) must not exceed a quarter of the ttl ({} ms)",
                self.requests.sweep_interval_ms,
                max_sweep_ms
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.requests.capacity, 20);
        assert_eq!(config.requests.ttl(), Duration::from_secs(30));
        assert_eq!(config.quests.max_name_length, 32);
        assert!(!config.quests.repeatable_by_default);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [requests]
            ttl_seconds = 60

            [quests]
            repeatable_by_default = true
            "#,
        )
        .unwrap();
        assert_eq!(config.requests.ttl_seconds, 60);
        assert_eq!(config.requests.capacity, 20);
        assert!(config.quests.repeatable_by_default);
        assert_eq!(config.storage.data_dir, "./data/questline");
    }

    #[test]
    fn test_validate_rejects_bad_request_settings() {
        let mut config = Config::default();
        config.requests.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.requests.ttl_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.requests.sweep_interval_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_huge_ttl() {
        let mut config = Config::default();
        config.requests.ttl_seconds = u64::MAX;
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_create_default_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questline.toml");
        let path = path.to_str().unwrap();

        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.requests, RequestsConfig::default());
        assert_eq!(loaded.logging.file.as_deref(), Some("questline.log"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[quests]\nmax_name_length = 0\n").unwrap();
        let result = tokio_test::block_on(Config::load(path.to_str().unwrap()));
        assert!(result.is_err());
    }

    #[test]
    fn test_quests_config_serialization() {
        let config = QuestsConfig {
            repeatable_by_default: true,
            max_name_length: 16,
        };
        let serialized = serde_json::to_string(&config).unwrap();
        assert!(serialized.contains("repeatable_by_default"));
        let deserialized: QuestsConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }
}
