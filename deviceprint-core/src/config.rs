//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/deviceprint/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/deviceprint/` (~/.config/deviceprint/)
//! - Data: `$XDG_DATA_HOME/deviceprint/` (~/.local/share/deviceprint/)
//! - State/Logs: `$XDG_STATE_HOME/deviceprint/` (~/.local/state/deviceprint/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

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
    /// Collection orchestrator configuration
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Submission gate thresholds
    #[serde(default)]
    pub gate: GateConfig,

    /// Device API transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collection orchestrator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Hard deadline for one collection pass, in seconds. Probes that
    /// have not settled by then are abandoned and a minimal fallback
    /// record is returned.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Capture full storage contents in the record. When false, storage
    /// snapshots degrade to a size-only summary.
    #[serde(default = "default_capture_storage")]
    pub capture_storage_contents: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            capture_storage_contents: default_capture_storage(),
        }
    }
}

fn default_deadline_secs() -> u64 {
    10
}

fn default_capture_storage() -> bool {
    true
}

/// Submission gate thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    /// Minimum seconds between two submission attempts. Enforced even
    /// for forced submissions.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Seconds during which an identical stability signature suppresses
    /// a re-submission.
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            duplicate_window_secs: default_duplicate_window_secs(),
        }
    }
}

fn default_min_interval_secs() -> u64 {
    5
}

fn default_duplicate_window_secs() -> u64 {
    60
}

/// Device API transport configuration
///
/// When enabled, collected records are posted to the backend save
/// endpoint in addition to the local fallback store.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// Enable/disable submission to the backend
    #[serde(default)]
    pub enabled: bool,

    /// Backend base URL (e.g., `https://devices.example.com`)
    pub server_url: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_transport_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_transport_max_retries")]
    pub max_retries: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            timeout_secs: default_transport_timeout(),
            max_retries: default_transport_max_retries(),
        }
    }
}

impl TransportConfig {
    /// Check if the transport is properly configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.server_url.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::Config(
                "transport.server_url is required when transport is enabled".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "transport.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_transport_timeout() -> u64 {
    30
}

fn default_transport_max_retries() -> usize {
    3
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
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/deviceprint/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("deviceprint").join("config.toml")
    }

    /// Returns the data directory path (for the local SQLite store)
    ///
    /// `$XDG_DATA_HOME/deviceprint/`
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("deviceprint")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/deviceprint/`
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("deviceprint")
    }

    /// Returns the local store file path
    ///
    /// `$XDG_DATA_HOME/deviceprint/data.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/deviceprint/deviceprint.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("deviceprint.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection.deadline_secs, 10);
        assert!(config.collection.capture_storage_contents);
        assert_eq!(config.gate.min_interval_secs, 5);
        assert_eq!(config.gate.duplicate_window_secs, 60);
        assert!(!config.transport.enabled);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[collection]
deadline_secs = 5
capture_storage_contents = false

[gate]
min_interval_secs = 2

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.collection.deadline_secs, 5);
        assert!(!config.collection.capture_storage_contents);
        assert_eq!(config.gate.min_interval_secs, 2);
        assert_eq!(config.gate.duplicate_window_secs, 60);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_transport_config_validation() {
        // Disabled config is always valid
        let config = TransportConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_ready());

        // Enabled without a server URL should fail
        let config = TransportConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Enabled with a server URL should pass
        let config = TransportConfig {
            enabled: true,
            server_url: Some("https://devices.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.is_ready());
    }

    #[test]
    fn test_parse_transport_config() {
        let toml = r#"
[transport]
enabled = true
server_url = "https://devices.example.com"
timeout_secs = 10
max_retries = 1
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.transport.enabled);
        assert_eq!(
            config.transport.server_url.as_deref(),
            Some("https://devices.example.com")
        );
        assert_eq!(config.transport.timeout_secs, 10);
        assert_eq!(config.transport.max_retries, 1);
    }
}
