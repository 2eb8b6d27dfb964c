//! Configuration for the DuetScreen runner
//!
//! Provides configuration file handling, defaults and validation.
//! Supports JSON and TOML file formats stored in the platform config
//! directory.
//!
//! Configuration is organized into logical sections:
//! - WiFi credentials
//! - Controller address, password and HTTP limits
//! - Serial port and framing limits
//! - Poll timings

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name used inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// WiFi network the panel joins
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiSettings {
    pub ssid: String,
    pub password: String,
}

/// Controller reached over WiFi
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Host name or IP address, optionally with an `http://` scheme
    pub address: String,
    /// Password sent with `rr_connect`; empty when the controller has none
    pub password: String,
    /// Per-request HTTP timeout in milliseconds
    pub http_timeout_ms: u64,
    /// Largest response body accepted, in bytes
    pub response_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            address: String::new(),
            password: String::new(),
            http_timeout_ms: 150,
            response_capacity: 16 * 1024,
        }
    }
}

impl ControllerSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// PanelDue serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port name, or "Auto" to take the first candidate port
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Longest response line accepted, in bytes
    pub frame_capacity: usize,
    /// How long to wait for a complete response line, in milliseconds
    pub response_timeout_ms: u64,
    /// Consecutive timeouts tolerated before the link is declared dead
    pub timeout_threshold: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "Auto".to_string(),
            baud_rate: 57600,
            read_timeout_ms: 10,
            frame_capacity: 2048,
            response_timeout_ms: 15_000,
            timeout_threshold: 1,
        }
    }
}

impl SerialSettings {
    pub fn is_auto(&self) -> bool {
        self.port.is_empty() || self.port.eq_ignore_ascii_case("auto")
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Scheduler timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Scheduler tick period in milliseconds
    pub tick_interval_ms: u64,
    /// Ticks between poll cycles
    pub ticks_per_poll: u32,
    /// Period of the extended status refresh, in seconds
    pub extended_refresh_secs: u64,
    /// How long WiFi may stay down before falling back to serial, in seconds
    pub wifi_fallback_secs: u64,
    /// Period of the status display, in milliseconds
    pub display_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            ticks_per_poll: 1,
            extended_refresh_secs: 10,
            wifi_fallback_secs: 15,
            display_interval_ms: 1000,
        }
    }
}

impl PollingSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn extended_refresh(&self) -> Duration {
        Duration::from_secs(self.extended_refresh_secs)
    }

    pub fn wifi_fallback(&self) -> Duration {
        Duration::from_secs(self.wifi_fallback_secs)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }
}

/// Complete runner configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wifi: WifiSettings,
    pub controller: ControllerSettings,
    pub serial: SerialSettings,
    pub polling: PollingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> ConfigResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("(none)").to_string(),
        )),
    }
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<platform config dir>/duetscreen/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let base = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(base.join("duetscreen").join(CONFIG_FILE_NAME))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("{} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content)
            .map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.controller.http_timeout_ms == 0 {
            return Err(out_of_range("controller.http_timeout_ms", 0));
        }
        if self.controller.response_capacity < 64 {
            return Err(out_of_range(
                "controller.response_capacity",
                self.controller.response_capacity,
            ));
        }

        if self.serial.baud_rate == 0 {
            return Err(out_of_range("serial.baud_rate", 0));
        }
        if self.serial.frame_capacity < 16 {
            return Err(out_of_range("serial.frame_capacity", self.serial.frame_capacity));
        }
        if self.serial.response_timeout_ms == 0 {
            return Err(out_of_range("serial.response_timeout_ms", 0));
        }

        if self.polling.tick_interval_ms == 0 {
            return Err(out_of_range("polling.tick_interval_ms", 0));
        }
        if self.polling.ticks_per_poll == 0 {
            return Err(out_of_range("polling.ticks_per_poll", 0));
        }
        if self.polling.extended_refresh_secs == 0 {
            return Err(out_of_range("polling.extended_refresh_secs", 0));
        }
        if self.polling.display_interval_ms == 0 {
            return Err(out_of_range("polling.display_interval_ms", 0));
        }

        if !self.wifi.ssid.is_empty() && self.controller.address.trim().is_empty() {
            return Err(ConfigError::MissingKey("controller.address".to_string()));
        }

        Ok(())
    }
}
