//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/querylens/config.toml`. Every
//! section and field is optional; a missing file means all defaults.
//!
//! Paths follow the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/querylens/` (~/.config/querylens/)
//! - State/Logs: `$XDG_STATE_HOME/querylens/` (~/.local/state/querylens/)

use crate::error::{Error, Result};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

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

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Where to fetch snapshots from
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Poll cadence and history depth
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordinator HTTP endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct CoordinatorConfig {
    /// Base URL, without the `/v1/query` path
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CoordinatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Refresh loop settings
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Delay between polls, also used as the retry delay after a failure
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Samples kept per rate history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl MonitorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

fn default_refresh_interval_ms() -> u64 {
    5000
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of rotated log files to keep
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

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.base_url.trim().is_empty() {
            return Err(Error::Config(
                "coordinator.base_url must not be empty".to_string(),
            ));
        }
        if self.monitor.refresh_interval_ms == 0 {
            return Err(Error::Config(
                "monitor.refresh_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.monitor.history_capacity == 0 {
            return Err(Error::Config(
                "monitor.history_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/querylens/config.toml` (~/.config/querylens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("querylens").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/querylens/` (~/.local/state/querylens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("querylens")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/querylens/querylens.log` (~/.local/state/querylens/querylens.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("querylens.log")
    }
}
