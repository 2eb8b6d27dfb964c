//! Settings errors
//!
//! Configuration files and the key/value store fail in different ways, so
//! each has its own enum; [`SettingsError`] wraps both for callers that
//! only want one type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    /// No platform configuration directory (no `$HOME`, `%APPDATA%`, ...)
    #[error("No configuration directory on this platform")]
    NoConfigDir,

    #[error("Cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Cannot render TOML configuration: {0}")]
    TomlRender(#[from] toml::ser::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A configuration that parsed but cannot be used
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A value the runner cannot work without is empty
    #[error("'{0}' must be set")]
    MissingKey(String),

    /// Only `.json` and `.toml` files are understood
    #[error("Unsupported configuration file extension: {0}")]
    UnsupportedFormat(String),

    #[error("'{key}' cannot be {value}")]
    ValueOutOfRange { key: String, value: String },
}

/// Key/value store failures
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A stored value does not parse as the type its key expects
    #[error("Stored value for '{key}' is not usable: {value:?}")]
    InvalidValue { key: String, value: String },

    /// The backing file does not hold a flat string map
    #[error("Settings store is corrupted: {0}")]
    Corrupted(String),

    #[error("Settings store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Settings store encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
