//! Data models for the machine-state snapshot
//!
//! This module provides:
//! - Machine status and heater state enumerations
//! - The reconciled [`MachineSnapshot`] read by the panel UI
//! - Temperature history ring buffers
//! - Fixed-capacity lists for tools, axes and directory listings

pub mod bounded;
pub mod history;
pub mod listing;
pub mod snapshot;

pub use bounded::BoundedList;
pub use history::{TemperatureHistory, HISTORY_LEN};
pub use listing::{EntryKind, Listing, ListingEntry, ListingKind, Listings, MAX_ENTRY_NAME_LEN};
pub use snapshot::{
    Axis, Bed, BoardInfo, FirmwareInfo, JobProgress, LegacyTimesLeft, MachineSnapshot, Sequences,
    TimeSource, TimesLeft, Tool,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of tools the panel displays
pub const MAX_TOOLS: usize = 6;

/// Number of heater slots tracked (slot 0 is the bed)
pub const MAX_HEATERS: usize = 8;

/// Maximum number of axes tracked
pub const MAX_AXES: usize = 9;

/// Longest tool/firmware name kept
pub const MAX_NAME_LEN: usize = 32;

/// Longest console reply kept
pub const MAX_REPLY_LEN: usize = 256;

/// Axis letters in RepRapFirmware's default order
pub const AXIS_LETTERS: [char; MAX_AXES] = ['X', 'Y', 'Z', 'U', 'V', 'W', 'A', 'B', 'C'];

/// Truncate `text` to at most `max` bytes without splitting a character
pub fn bounded_text(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Overall machine status as reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MachineStatus {
    ReadingConfig,
    Idle,
    Busy,
    Printing,
    Decelerating,
    Stopped,
    Resuming,
    Halted,
    Flashing,
    ToolChange,
    Simulating,
    #[default]
    Unknown,
}

impl MachineStatus {
    /// Map the single-character status used by `rr_status`
    pub fn from_status_char(c: char) -> Self {
        match c {
            'C' => Self::ReadingConfig,
            'I' => Self::Idle,
            'B' => Self::Busy,
            'P' => Self::Printing,
            'D' => Self::Decelerating,
            'S' => Self::Stopped,
            'R' => Self::Resuming,
            'H' => Self::Halted,
            'F' => Self::Flashing,
            'T' => Self::ToolChange,
            'M' => Self::Simulating,
            _ => Self::Unknown,
        }
    }

    /// Map the `state.status` string of the RRF3 object model
    pub fn from_object_model(status: &str) -> Self {
        match status {
            "starting" => Self::ReadingConfig,
            "idle" => Self::Idle,
            "busy" | "cancelling" => Self::Busy,
            "processing" => Self::Printing,
            "pausing" => Self::Decelerating,
            "paused" => Self::Stopped,
            "resuming" => Self::Resuming,
            "halted" => Self::Halted,
            "updating" => Self::Flashing,
            "changingTool" => Self::ToolChange,
            "simulating" => Self::Simulating,
            _ => Self::Unknown,
        }
    }

    /// Whether a print or simulation is in progress (including paused)
    pub fn job_running(&self) -> bool {
        matches!(
            self,
            Self::Printing | Self::Decelerating | Self::Stopped | Self::Resuming | Self::Simulating
        )
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadingConfig => "Reading config",
            Self::Idle => "Idle",
            Self::Busy => "Busy",
            Self::Printing => "Printing",
            Self::Decelerating => "Pausing",
            Self::Stopped => "Paused",
            Self::Resuming => "Resuming",
            Self::Halted => "Halted",
            Self::Flashing => "Updating firmware",
            Self::ToolChange => "Changing tool",
            Self::Simulating => "Simulating",
            Self::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// Heater slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeaterState {
    #[default]
    Off,
    Standby,
    Active,
    Fault,
}

impl HeaterState {
    /// Map an RRF3 heater state string by its first character
    pub fn from_object_model(state: &str) -> Self {
        match state.chars().next() {
            Some('o') => Self::Off,
            Some('a') => Self::Active,
            Some('s') => Self::Standby,
            _ => Self::Fault,
        }
    }

    /// Map the numeric heater state used by `rr_status`
    ///
    /// 4 (auto-tuning) counts as active.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Off,
            1 => Self::Standby,
            2 | 4 => Self::Active,
            _ => Self::Fault,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_char_mapping() {
        assert_eq!(MachineStatus::from_status_char('P'), MachineStatus::Printing);
        assert_eq!(MachineStatus::from_status_char('I'), MachineStatus::Idle);
        assert_eq!(MachineStatus::from_status_char('M'), MachineStatus::Simulating);
        assert_eq!(MachineStatus::from_status_char('x'), MachineStatus::Unknown);
    }

    #[test]
    fn test_job_running() {
        assert!(MachineStatus::Printing.job_running());
        assert!(MachineStatus::Stopped.job_running());
        assert!(MachineStatus::Simulating.job_running());
        assert!(!MachineStatus::Idle.job_running());
        assert!(!MachineStatus::Busy.job_running());
        assert!(!MachineStatus::Unknown.job_running());
    }

    #[test]
    fn test_heater_state_first_char() {
        assert_eq!(HeaterState::from_object_model("off"), HeaterState::Off);
        assert_eq!(HeaterState::from_object_model("active"), HeaterState::Active);
        assert_eq!(HeaterState::from_object_model("standby"), HeaterState::Standby);
        assert_eq!(HeaterState::from_object_model("fault"), HeaterState::Fault);
        assert_eq!(HeaterState::from_object_model("tuning"), HeaterState::Fault);
        assert_eq!(HeaterState::from_object_model(""), HeaterState::Fault);
    }

    #[test]
    fn test_bounded_text_respects_char_boundaries() {
        assert_eq!(bounded_text("hotend", 32), "hotend");
        assert_eq!(bounded_text("abcdef", 3), "abc");
        assert_eq!(bounded_text("düse", 2), "d");
    }
}
