// Configuration module for the rotation trainer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::ability::JobId;
use crate::core::binding::{KeyBindings, KeyChord};
use crate::core::constants::{HISTORY_LIMIT, HOST_POLL_INTERVAL, RECONNECT_DELAY};
use crate::core::session::SessionOptions;
use crate::transport::{HostTransport, OverlayHost};

// =============================================================================
// CONFIGURATION STRUCTURES
// =============================================================================

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoggingSettings {
    /// Mirror logs to stdout
    #[serde(default)]
    pub console: bool,
    /// Log file path (relative to the config file or absolute). Empty = no file logging.
    #[serde(default)]
    pub log_file: String,
}

/// Overlay host connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// WebSocket endpoint; empty = no socket
    #[serde(default)]
    pub url: String,
    /// Fixed delay between reconnection attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Interval between host readiness checks
    #[serde(default = "default_host_poll_interval_ms")]
    pub host_poll_interval_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    RECONNECT_DELAY.as_millis() as u64
}

fn default_host_poll_interval_ms() -> u64 {
    HOST_POLL_INTERVAL.as_millis() as u64
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            host_poll_interval_ms: default_host_poll_interval_ms(),
        }
    }
}

impl TransportSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn host_poll_interval(&self) -> Duration {
        Duration::from_millis(self.host_poll_interval_ms)
    }

    /// Host transport that re-checks readiness at the configured interval
    pub fn host_transport<H: OverlayHost>(&self, host: H) -> HostTransport<H> {
        HostTransport::with_poll_interval(host, self.host_poll_interval())
    }
}

/// Trainer behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerSettings {
    /// Only the primary player's abilities advance the rotation
    #[serde(default = "default_primary_player_only")]
    pub primary_player_only: bool,
    /// Number of accepted abilities kept for the history view
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Job assumed at startup, before the log reports one
    #[serde(default)]
    pub job_id: Option<JobId>,
}

fn default_primary_player_only() -> bool {
    true
}

fn default_history_limit() -> usize {
    HISTORY_LIMIT
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            primary_player_only: default_primary_player_only(),
            history_limit: default_history_limit(),
            job_id: None,
        }
    }
}

impl TrainerSettings {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            primary_player_only: self.primary_player_only,
            history_limit: self.history_limit,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub trainer: TrainerSettings,
    /// Label → chord overrides on top of the default hotbar bindings
    #[serde(default)]
    pub keybindings: BTreeMap<String, KeyChord>,
}

// =============================================================================
// CONFIG LOADING
// =============================================================================

#[derive(Debug)]
pub enum ConfigError {
    PathError,
    ReadError(std::io::Error),
    ParseError(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::PathError => write!(f, "Could not determine config file path"),
            ConfigError::ReadError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::PathError => None,
            ConfigError::ReadError(e) => Some(e),
            ConfigError::ParseError(e) => Some(e),
        }
    }
}

impl Config {
    pub const CONFIG_FILENAME: &'static str = "rotation_trainer.toml";

    /// Default config location: next to the executable
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let exe = std::env::current_exe().map_err(|_| ConfigError::PathError)?;
        let dir = exe.parent().ok_or(ConfigError::PathError)?;
        Ok(dir.join(Self::CONFIG_FILENAME))
    }

    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "[config] Looking for config");

        if !path.exists() {
            debug!("[config] No config found, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            path = %path.display(),
            url = %config.transport.url,
            overrides = config.keybindings.len(),
            "[config] Loaded config"
        );
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::ParseError)
    }

    /// Default hotbar bindings with the configured overrides applied
    pub fn key_bindings(&self) -> KeyBindings {
        KeyBindings::with_overrides(&self.keybindings)
    }

    /// Resolve the log file against the config directory; `None` when disabled
    pub fn log_file_path(&self, config_dir: &Path) -> Option<PathBuf> {
        if self.logging.log_file.is_empty() {
            return None;
        }
        let path = PathBuf::from(&self.logging.log_file);
        if path.is_absolute() {
            Some(path)
        } else {
            Some(config_dir.join(path))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
