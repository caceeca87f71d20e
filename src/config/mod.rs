//! Configuration module for the chart recorder
//!
//! This module handles application configuration including:
//! - Serial link parameters (device path, baud rate, read timeout)
//! - The channel space the parser recognizes and the channels surfaced to consumers
//! - Acquisition and tick cadence
//! - Optional autosave and log file locations
//!
//! The configuration is read once at startup and treated as immutable by the
//! backend. It is stored as TOML.
//!
//! # Config Location
//!
//! When no explicit path is given the config is looked up in the
//! platform-appropriate data directory under `chart-recorder`:
//!
//! - **Linux**: `~/.local/share/chart-recorder/config.toml`
//! - **macOS**: `~/Library/Application Support/chart-recorder/config.toml`
//! - **Windows**: `%APPDATA%\chart-recorder\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use chart_recorder::config::AppConfig;
//!
//! let config = AppConfig::load("recorder.toml")?;
//! config.validate()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{RecorderError, Result};
use crate::types::ChannelId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "chart-recorder";

/// Config filename inside the app data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Default serial device
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate of the ADC board
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default blocking read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Default number of addressable ADC channels
pub const DEFAULT_TOTAL_CHANNELS: ChannelId = 10;

/// Default interval between consumer ticks in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Config Sections ====================

/// Serial link parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`)
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Blocking read timeout in milliseconds. Also bounds how long `stop`
    /// waits for the acquisition worker.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl SerialConfig {
    /// Read timeout as a `Duration`
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Copy of this config pointing at another device
    pub fn with_port(&self, port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..self.clone()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Channel space configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channels surfaced to consumers and stored in each recording
    #[serde(default = "default_active_channels")]
    pub active: Vec<ChannelId>,

    /// Number of channels the parser recognizes (`CH0` .. `CH{total-1}`)
    #[serde(default = "default_total_channels")]
    pub total: ChannelId,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            active: default_active_channels(),
            total: default_total_channels(),
        }
    }
}

/// Acquisition behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Interval between consumer ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Discard lines received before the first sentinel after `inject`,
    /// since they may belong to a frame that started before recording
    #[serde(default)]
    pub sync_to_frame_boundary: bool,
}

impl AcquisitionConfig {
    /// Tick interval as a `Duration`
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            sync_to_frame_boundary: false,
        }
    }
}

/// Export options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// When set, the recording is rewritten to this CSV file on every tick
    #[serde(default)]
    pub autosave_path: Option<PathBuf>,
}

/// Logging options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Additional log file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub view: ViewSettings,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RecorderError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecorderError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RecorderError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            RecorderError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check the config for values the backend cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.serial.baud_rate == 0 {
            return Err(RecorderError::Config("baud rate must be positive".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(RecorderError::Config("read timeout must be positive".into()));
        }
        if self.acquisition.tick_interval_ms == 0 {
            return Err(RecorderError::Config("tick interval must be positive".into()));
        }
        if self.channels.active.is_empty() {
            return Err(RecorderError::Config("no active channels configured".into()));
        }
        if let Some(ch) = self
            .channels
            .active
            .iter()
            .find(|ch| **ch >= self.channels.total)
        {
            return Err(RecorderError::Config(format!(
                "active channel {} outside of 0..{}",
                ch, self.channels.total
            )));
        }
        Ok(())
    }
}

// ==================== Serde Defaults ====================

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_active_channels() -> Vec<ChannelId> {
    vec![1, 8]
}

fn default_total_channels() -> ChannelId {
    DEFAULT_TOTAL_CHANNELS
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
