//! RON configuration parsing for the server

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/habitforge.ron";

/// Root configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Listen address (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Storage settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Periodic reminder scan
    #[serde(default)]
    pub reminders: ReminderConfig,
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_filter() -> String {
    "habitforge=info,info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            database: DatabaseConfig::default(),
            reminders: ReminderConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database file; `None` keeps everything in memory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Reminder scan settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReminderConfig {
    #[serde(default = "default_reminders_enabled")]
    pub enabled: bool,
    /// Seconds between scans
    #[serde(default = "default_reminder_interval")]
    pub interval_secs: u64,
}

fn default_reminders_enabled() -> bool {
    true
}

fn default_reminder_interval() -> u64 {
    3600
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: default_reminders_enabled(),
            interval_secs: default_reminder_interval(),
        }
    }
}

impl Config {
    /// Load configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and validate RON text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = ron::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.reminders.enabled && self.reminders.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "reminders.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Validation("log_filter must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::Validation(format!("invalid listen address '{}'", self.listen)))
    }
}

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_struct() {
        let config = Config::parse("()").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database.path, None);
        assert!(config.reminders.enabled);
        assert_eq!(config.reminders.interval_secs, 3600);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"(
                listen: "0.0.0.0:9000",
                database: (path: Some("data/habits.db")),
                reminders: (enabled: false, interval_secs: 0),
                log_filter: "debug",
            )"#,
        )
        .unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 9000);
        assert_eq!(config.database.path, Some(PathBuf::from("data/habits.db")));
        assert!(!config.reminders.enabled);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            Config::parse(r#"(listen: "not an address")"#),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("(reminders: (interval_secs: 0))"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(Config::parse("(listen: 5)"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("does/not/exist.ron").unwrap();
        assert_eq!(config, Config::default());
        assert!(matches!(Config::load("does/not/exist.ron"), Err(ConfigError::Io(_))));
    }
}
