//! Firmware support
//!
//! Supported controllers:
//! - RepRapFirmware 1.x/2.x through the legacy `rr_status` responses
//! - RepRapFirmware 3.x through the object model (`M409`)
//!
//! [`link_watch`] tracks how long the WiFi link has been down so the poller
//! can decide when to fall back to the serial port.

pub mod duet;
pub mod link_watch;

pub use duet::{
    CommandDispatcher, DecodeOutcome, Dialect, DispatchOutcome, ExtendedRefresh, LinkState,
    Poller, PollerConfig, RemoteApi, StatusKind, TickOutcome,
};
pub use link_watch::{LinkWatch, LinkWatchState};
