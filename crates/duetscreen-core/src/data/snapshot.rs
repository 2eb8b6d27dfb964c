//! Machine-state snapshot
//!
//! The snapshot is created once at start-up with every value unknown and is
//! then updated in place by the status decoders for as long as the panel
//! runs. Only the poller writes to it; the UI reads it.

use super::bounded::BoundedList;
use super::history::{TemperatureHistory, HISTORY_LEN};
use super::listing::Listings;
use super::{bounded_text, HeaterState, MachineStatus, AXIS_LETTERS, MAX_AXES, MAX_HEATERS};
use super::{MAX_NAME_LEN, MAX_REPLY_LEN, MAX_TOOLS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Heated bed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bed {
    /// Heater slot driving the bed
    pub heater: Option<usize>,
    pub active: Option<f32>,
    pub standby: Option<f32>,
    pub history: TemperatureHistory,
}

impl Bed {
    /// Last reading
    pub fn current(&self) -> Option<f32> {
        self.history.latest()
    }
}

impl Default for Bed {
    fn default() -> Self {
        Self {
            heater: None,
            active: None,
            standby: None,
            history: TemperatureHistory::new(HISTORY_LEN),
        }
    }
}

/// A tool as configured on the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub number: i64,
    pub name: String,
    /// Heater slot of the tool's first heater
    pub heater: Option<usize>,
    /// Print-cooling fan index
    pub fan: Option<usize>,
    pub active: Option<f32>,
    pub standby: Option<f32>,
    pub history: TemperatureHistory,
}

impl Tool {
    pub fn new(number: i64) -> Self {
        Self {
            number,
            name: String::new(),
            heater: None,
            fan: None,
            active: None,
            standby: None,
            history: TemperatureHistory::new(HISTORY_LEN),
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = bounded_text(name, MAX_NAME_LEN);
    }

    /// Last reading
    pub fn current(&self) -> Option<f32> {
        self.history.latest()
    }
}

/// Where a remaining-time estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSource {
    Simulation,
    Slicer,
    File,
}

impl fmt::Display for TimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulation => write!(f, "simulation"),
            Self::Slicer => write!(f, "slicer"),
            Self::File => write!(f, "file"),
        }
    }
}

/// Remaining-time estimates of the RRF3 object model, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesLeft {
    pub simulation: Option<f32>,
    pub slicer: Option<f32>,
    pub file: Option<f32>,
}

impl TimesLeft {
    /// First estimate present in the order simulation, slicer, file
    pub fn preferred(&self) -> Option<(TimeSource, f32)> {
        self.simulation
            .map(|t| (TimeSource::Simulation, t))
            .or_else(|| self.slicer.map(|t| (TimeSource::Slicer, t)))
            .or_else(|| self.file.map(|t| (TimeSource::File, t)))
    }
}

/// Remaining-time estimates of `rr_status?type=3`, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyTimesLeft {
    pub file: Option<f32>,
    pub filament: Option<f32>,
    pub layer: Option<f32>,
}

/// Print job progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Percent complete, 0-100
    pub percent: Option<f32>,
    /// Elapsed print time in seconds
    pub duration: Option<f32>,
    pub layer: Option<u32>,
    pub total_layers: Option<u32>,
    pub times_left: TimesLeft,
    /// Remaining seconds taken from `times_left`
    pub remaining: Option<f32>,
    pub remaining_source: Option<TimeSource>,
    pub legacy_times_left: LegacyTimesLeft,
    pub file_name: Option<String>,
    pub height: Option<f32>,
    pub first_layer_height: Option<f32>,
    pub layer_height: Option<f32>,
    /// Total duration measured by a simulation run
    pub file_simulated_time: Option<f32>,
    /// Total duration from the slicer's file metadata
    pub file_print_time: Option<f32>,
}

impl JobProgress {
    pub fn set_file_name(&mut self, name: &str) {
        self.file_name = Some(bounded_text(name, MAX_NAME_LEN * 2));
    }

    /// Recompute `total_layers` from the layer geometry when it is complete
    pub fn derive_total_layers(&mut self) {
        if let (Some(height), Some(first), Some(layer)) =
            (self.height, self.first_layer_height, self.layer_height)
        {
            if layer > 0.0 && height >= first {
                self.total_layers = Some(((height - first) / layer).round() as u32 + 1);
            }
        }
    }

    /// Take the preferred estimate from `times_left` and refresh `percent`
    ///
    /// Percent is elapsed time over elapsed plus remaining. Returns `false`
    /// when no estimate is present, in which case nothing changes.
    pub fn apply_times_left(&mut self) -> bool {
        let Some((source, remaining)) = self.times_left.preferred() else {
            return false;
        };
        self.remaining = Some(remaining);
        self.remaining_source = Some(source);
        if let Some(elapsed) = self.duration {
            let basis = elapsed + remaining;
            if basis > 0.0 {
                self.percent = Some((elapsed / basis * 100.0).clamp(0.0, 100.0));
            }
        }
        true
    }
}

/// One machine axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub letter: char,
    pub position: Option<f32>,
    pub homed: bool,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub babystep: Option<f32>,
}

impl Axis {
    pub fn new(letter: char) -> Self {
        Self {
            letter,
            position: None,
            homed: false,
            min: None,
            max: None,
            babystep: None,
        }
    }
}

/// Controller identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub board: Option<String>,
}

/// Board sensors and fan output
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub mcu_temp: Option<f32>,
    /// Duty of the active tool's fan, 0-100
    pub fan_percent: Option<f32>,
}

/// Sequence counters used to skip redundant fetches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequences {
    /// Last seen console reply counter
    pub reply: Option<u64>,
    /// A reply counter change has not been followed by a fetch yet
    pub reply_pending: bool,
    /// Last console reply fetched
    pub last_reply: String,
}

impl Sequences {
    /// Record a reply counter; returns `true` when it differs from the last one
    pub fn observe_reply(&mut self, seq: u64) -> bool {
        let changed = self.reply.is_some_and(|prev| prev != seq);
        self.reply = Some(seq);
        if changed {
            self.reply_pending = true;
        }
        changed
    }

    pub fn set_reply(&mut self, text: &str) {
        self.last_reply = bounded_text(text.trim_end(), MAX_REPLY_LEN);
        self.reply_pending = false;
    }
}

/// Everything the panel knows about the printer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub status: MachineStatus,
    pub bed: Bed,
    pub tools: BoundedList<Tool>,
    pub current_tool: Option<i64>,
    pub heater_states: [HeaterState; MAX_HEATERS],
    pub job: JobProgress,
    pub axes: BoundedList<Axis>,
    pub firmware: FirmwareInfo,
    pub board: BoardInfo,
    pub seqs: Sequences,
    pub listings: Listings,
}

impl MachineSnapshot {
    pub fn new() -> Self {
        Self {
            status: MachineStatus::Unknown,
            bed: Bed::default(),
            tools: BoundedList::new(MAX_TOOLS),
            current_tool: None,
            heater_states: [HeaterState::Off; MAX_HEATERS],
            job: JobProgress::default(),
            axes: BoundedList::new(MAX_AXES),
            firmware: FirmwareInfo::default(),
            board: BoardInfo::default(),
            seqs: Sequences::default(),
            listings: Listings::default(),
        }
    }

    /// Whether a job is in progress, used to pick the next status query
    pub fn job_running(&self) -> bool {
        self.status.job_running()
    }

    /// Axis at `index`, created with the default letter when missing
    pub fn axis_mut(&mut self, index: usize) -> Option<&mut Axis> {
        self.axes
            .slot_or_fill(index, |i| Axis::new(AXIS_LETTERS.get(i).copied().unwrap_or('?')))
    }

    /// Tool with the given tool number
    pub fn tool_by_number(&self, number: i64) -> Option<&Tool> {
        self.tools.iter().find(|t| t.number == number)
    }

    /// Set a heater slot, ignoring slots beyond the tracked range
    pub fn set_heater_state(&mut self, slot: usize, state: HeaterState) {
        if let Some(s) = self.heater_states.get_mut(slot) {
            *s = state;
        }
    }
}

impl Default for MachineSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
