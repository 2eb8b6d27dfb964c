//! # DuetScreen
//!
//! Headless status and command core for a touchscreen panel attached to a
//! RepRapFirmware (Duet) 3D printer controller.
//!
//! ## Architecture
//!
//! DuetScreen is organized as a workspace with multiple crates:
//!
//! 1. **duetscreen-core** - Machine snapshot, errors, connectivity events, shared handles
//! 2. **duetscreen-communication** - Serial and HTTP transports, status decoders, poller
//! 3. **duetscreen-settings** - Configuration files and key/value persistence
//! 4. **duetscreen** - Runner binary that wires the crates to real hardware
//!
//! ## Features
//!
//! - **Two links**: WiFi HTTP API with automatic fallback to the PanelDue serial port
//! - **Two dialects**: legacy `rr_status` and the RRF3 object model
//! - **Bounded memory**: fixed-capacity buffers, lists and temperature histories

pub mod runner;

pub use duetscreen_communication::{communication, firmware};
pub use duetscreen_core::data;

pub use duetscreen_core::{
    shared_snapshot, Connectivity, ConnectivityDispatcher, ConnectivityEvent, Error,
    MachineSnapshot, MachineStatus, ProtocolError, Result, SharedSnapshot, TransportError,
    UiLock,
};

pub use duetscreen_communication::{
    list_ports, ByteChannel, DispatchOutcome, ExtendedRefresh, HttpChannel, LinkState, Poller,
    PollerConfig, SerialChannel, TickOutcome,
};

pub use duetscreen_settings::{Config, FileStore, KeyValueStore, MemoryStore, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support, INFO otherwise
/// - Console output on stderr, so stdout carries only status lines
/// - JSON lines instead of text when `DUETSCREEN_LOG_JSON` is set
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if std::env::var_os("DUETSCREEN_LOG_JSON").is_some() {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);
        registry.with(fmt_layer).try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);
        registry.with(fmt_layer).try_init()?;
    }

    Ok(())
}
