//! DuetScreen Settings Crate
//!
//! Handles runner configuration files and key/value settings persistence.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    Config, ControllerSettings, PollingSettings, SerialSettings, WifiSettings, CONFIG_FILE_NAME,
};
pub use error::{
    ConfigError, ConfigResult, PersistenceError, PersistenceResult, SettingsError, SettingsResult,
};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, STORE_FILE_NAME};
