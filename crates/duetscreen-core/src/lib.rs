//! # DuetScreen Core
//!
//! Core types for the DuetScreen panel.
//! Provides the machine-state snapshot the UI renders, the error taxonomy
//! shared by transports and decoders, connectivity events and the handles
//! used to share state between tasks.

pub mod core;
pub mod data;
pub mod error;
pub mod types;

pub use crate::core::{Connectivity, ConnectivityDispatcher, ConnectivityEvent};

pub use data::{
    bounded_text, Axis, Bed, BoardInfo, BoundedList, EntryKind, FirmwareInfo, HeaterState,
    JobProgress, LegacyTimesLeft, Listing, ListingEntry, ListingKind, Listings, MachineSnapshot,
    MachineStatus, Sequences, TemperatureHistory, TimeSource, TimesLeft, Tool, AXIS_LETTERS,
    HISTORY_LEN, MAX_AXES, MAX_HEATERS, MAX_NAME_LEN, MAX_REPLY_LEN, MAX_TOOLS,
};

pub use error::{Error, ProtocolError, Result, TransportError};

pub use types::{shared_snapshot, SharedSnapshot, UiLock};
