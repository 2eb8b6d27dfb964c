//! Key/value settings persistence
//!
//! The panel stores user edits as flat string pairs such as
//! `wifi.ssid = workshop`. [`KeyValueStore`] is that storage seam;
//! [`FileStore`] keeps the pairs in a JSON object on disk and
//! [`MemoryStore`] keeps them in memory for tests and first boot.
//! [`Config::load_from_store`] and [`Config::save_to_store`] map the typed
//! configuration onto the flat layout.

use crate::config::Config;
use crate::error::{PersistenceError, PersistenceResult, SettingsResult};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Key/value store kept next to the configuration file
pub const STORE_FILE_NAME: &str = "settings.json";

pub const KEY_WIFI_SSID: &str = "wifi.ssid";
pub const KEY_WIFI_PASSWORD: &str = "wifi.password";
pub const KEY_CONTROLLER_ADDRESS: &str = "controller.address";
pub const KEY_CONTROLLER_PASSWORD: &str = "controller.password";
pub const KEY_HTTP_TIMEOUT_MS: &str = "controller.http_timeout_ms";
pub const KEY_RESPONSE_CAPACITY: &str = "controller.response_capacity";
pub const KEY_SERIAL_PORT: &str = "serial.port";
pub const KEY_SERIAL_BAUD_RATE: &str = "serial.baud_rate";
pub const KEY_SERIAL_READ_TIMEOUT_MS: &str = "serial.read_timeout_ms";
pub const KEY_FRAME_CAPACITY: &str = "serial.frame_capacity";
pub const KEY_RESPONSE_TIMEOUT_MS: &str = "serial.response_timeout_ms";
pub const KEY_TIMEOUT_THRESHOLD: &str = "serial.timeout_threshold";
pub const KEY_TICK_INTERVAL_MS: &str = "polling.tick_interval_ms";
pub const KEY_TICKS_PER_POLL: &str = "polling.ticks_per_poll";
pub const KEY_EXTENDED_REFRESH_SECS: &str = "polling.extended_refresh_secs";
pub const KEY_WIFI_FALLBACK_SECS: &str = "polling.wifi_fallback_secs";
pub const KEY_DISPLAY_INTERVAL_MS: &str = "polling.display_interval_ms";

/// Flat string settings storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> PersistenceResult<()>;

    /// Returns whether the key existed
    fn remove(&mut self, key: &str) -> PersistenceResult<bool>;

    fn keys(&self) -> Vec<String>;

    /// Make earlier writes durable
    fn flush(&mut self) -> PersistenceResult<()> {
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> PersistenceResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> PersistenceResult<bool> {
        Ok(self.values.remove(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Store persisted as a JSON object of strings
///
/// Writes are buffered until [`KeyValueStore::flush`].
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                let value: serde_json::Value = serde_json::from_str(&content)?;
                parse_map(value)?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!("{} settings read from {}", values.len(), path.display());
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn parse_map(value: serde_json::Value) -> PersistenceResult<BTreeMap<String, String>> {
    let serde_json::Value::Object(object) = value else {
        return Err(PersistenceError::Corrupted(
            "top level is not an object".to_string(),
        ));
    };
    object
        .into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            other => Err(PersistenceError::Corrupted(format!(
                "'{}' holds {} instead of a string",
                key, other
            ))),
        })
        .collect()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> PersistenceResult<()> {
        if self.values.get(key).map(String::as_str) != Some(value) {
            self.values.insert(key.to_string(), value.to_string());
            self.dirty = true;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> PersistenceResult<bool> {
        let existed = self.values.remove(key).is_some();
        self.dirty |= existed;
        Ok(existed)
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn flush(&mut self) -> PersistenceResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content)?;
        self.dirty = false;
        tracing::debug!("{} settings written to {}", self.values.len(), self.path.display());
        Ok(())
    }
}

/// Overwrite `target` with the stored value for `key`, if any
fn read_into<T>(store: &dyn KeyValueStore, key: &str, target: &mut T) -> PersistenceResult<()>
where
    T: FromStr,
{
    if let Some(raw) = store.get(key) {
        *target = raw
            .parse()
            .or_else(|_| raw.trim().parse())
            .map_err(|_| PersistenceError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            })?;
    }
    Ok(())
}

fn write_from<T: Display>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> PersistenceResult<()> {
    store.set(key, &value.to_string())
}

impl Config {
    /// Build a config from stored pairs; absent keys keep their defaults
    pub fn load_from_store(store: &dyn KeyValueStore) -> SettingsResult<Self> {
        let mut config = Self::default();
        config.apply_store(store)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay stored pairs on this config
    pub fn apply_store(&mut self, store: &dyn KeyValueStore) -> PersistenceResult<()> {
        let wifi = &mut self.wifi;
        read_into(store, KEY_WIFI_SSID, &mut wifi.ssid)?;
        read_into(store, KEY_WIFI_PASSWORD, &mut wifi.password)?;

        let controller = &mut self.controller;
        read_into(store, KEY_CONTROLLER_ADDRESS, &mut controller.address)?;
        read_into(store, KEY_CONTROLLER_PASSWORD, &mut controller.password)?;
        read_into(store, KEY_HTTP_TIMEOUT_MS, &mut controller.http_timeout_ms)?;
        read_into(store, KEY_RESPONSE_CAPACITY, &mut controller.response_capacity)?;

        let serial = &mut self.serial;
        read_into(store, KEY_SERIAL_PORT, &mut serial.port)?;
        read_into(store, KEY_SERIAL_BAUD_RATE, &mut serial.baud_rate)?;
        read_into(store, KEY_SERIAL_READ_TIMEOUT_MS, &mut serial.read_timeout_ms)?;
        read_into(store, KEY_FRAME_CAPACITY, &mut serial.frame_capacity)?;
        read_into(store, KEY_RESPONSE_TIMEOUT_MS, &mut serial.response_timeout_ms)?;
        read_into(store, KEY_TIMEOUT_THRESHOLD, &mut serial.timeout_threshold)?;

        let polling = &mut self.polling;
        read_into(store, KEY_TICK_INTERVAL_MS, &mut polling.tick_interval_ms)?;
        read_into(store, KEY_TICKS_PER_POLL, &mut polling.ticks_per_poll)?;
        read_into(store, KEY_EXTENDED_REFRESH_SECS, &mut polling.extended_refresh_secs)?;
        read_into(store, KEY_WIFI_FALLBACK_SECS, &mut polling.wifi_fallback_secs)?;
        read_into(store, KEY_DISPLAY_INTERVAL_MS, &mut polling.display_interval_ms)?;
        Ok(())
    }

    /// Write every setting to `store` and flush it
    pub fn save_to_store(&self, store: &mut dyn KeyValueStore) -> SettingsResult<()> {
        self.validate()?;

        write_from(store, KEY_WIFI_SSID, &self.wifi.ssid)?;
        write_from(store, KEY_WIFI_PASSWORD, &self.wifi.password)?;

        write_from(store, KEY_CONTROLLER_ADDRESS, &self.controller.address)?;
        write_from(store, KEY_CONTROLLER_PASSWORD, &self.controller.password)?;
        write_from(store, KEY_HTTP_TIMEOUT_MS, &self.controller.http_timeout_ms)?;
        write_from(store, KEY_RESPONSE_CAPACITY, &self.controller.response_capacity)?;

        write_from(store, KEY_SERIAL_PORT, &self.serial.port)?;
        write_from(store, KEY_SERIAL_BAUD_RATE, &self.serial.baud_rate)?;
        write_from(store, KEY_SERIAL_READ_TIMEOUT_MS, &self.serial.read_timeout_ms)?;
        write_from(store, KEY_FRAME_CAPACITY, &self.serial.frame_capacity)?;
        write_from(store, KEY_RESPONSE_TIMEOUT_MS, &self.serial.response_timeout_ms)?;
        write_from(store, KEY_TIMEOUT_THRESHOLD, &self.serial.timeout_threshold)?;

        write_from(store, KEY_TICK_INTERVAL_MS, &self.polling.tick_interval_ms)?;
        write_from(store, KEY_TICKS_PER_POLL, &self.polling.ticks_per_poll)?;
        write_from(store, KEY_EXTENDED_REFRESH_SECS, &self.polling.extended_refresh_secs)?;
        write_from(store, KEY_WIFI_FALLBACK_SECS, &self.polling.wifi_fallback_secs)?;
        write_from(store, KEY_DISPLAY_INTERVAL_MS, &self.polling.display_interval_ms)?;

        store.flush()?;
        Ok(())
    }
}
