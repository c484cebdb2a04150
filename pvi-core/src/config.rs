//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/pvi/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/pvi/` (~/.config/pvi/)
//! - Data: `$XDG_DATA_HOME/pvi/` (~/.local/share/pvi/)
//! - State/Logs: `$XDG_STATE_HOME/pvi/` (~/.local/state/pvi/)

use crate::error::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage overrides
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Analytics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Length of the trailing scoring window, in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

impl AnalyticsConfig {
    /// The scoring window as a duration.
    pub fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days))
    }
}

fn default_window_days() -> u32 {
    crate::analytics::window::DEFAULT_WINDOW_DAYS as u32
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Storage configuration
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Override for the SQLite database file
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the analytics engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.analytics.window_days == 0 {
            return Err(Error::Config(
                "analytics.window_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path honoring the `storage.database_path` override.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/pvi/config.toml` (~/.config/pvi/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("pvi").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/pvi/` (~/.local/share/pvi/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("pvi")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/pvi/` (~/.local/state/pvi/). The daily log files
    /// `pvi.YYYY-MM-DD.log` live here.
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("pvi")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/pvi/pvi.db` (~/.local/share/pvi/pvi.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("pvi.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analytics.window_days, 14);
        assert_eq!(config.analytics.window(), Duration::days(14));
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[analytics]
window_days = 7

[logging]
level = "debug"

[storage]
database_path = "/tmp/pvi-test.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.analytics.window_days, 7);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 5);
        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/pvi-test.db")
        );
    }

    #[test]
    fn test_zero_window_rejected() {
        let config: Config = toml::from_str("[analytics]\nwindow_days = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analytics]\nwindow_days = 30\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.analytics.window_days, 30);
    }
}
