//! Temperature history ring buffer
//!
//! Every heater shown on the panel keeps its most recent readings in a fixed
//! ring. The write cursor points at the slot written last and wraps at the
//! capacity; it is unset until the first sample arrives.

use serde::{Deserialize, Serialize};

/// Default number of samples kept per heater
pub const HISTORY_LEN: usize = 60;

/// Fixed-capacity ring of temperature samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureHistory {
    samples: Vec<Option<f32>>,
    cursor: Option<usize>,
}

impl TemperatureHistory {
    /// Create an empty history with room for `capacity` samples
    ///
    /// A capacity of zero is bumped to one so the cursor invariant holds.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![None; capacity.max(1)],
            cursor: None,
        }
    }

    /// Record a new sample, overwriting the oldest once full
    pub fn push(&mut self, value: f32) {
        let next = match self.cursor {
            Some(cursor) => (cursor + 1) % self.samples.len(),
            None => 0,
        };
        self.samples[next] = Some(value);
        self.cursor = Some(next);
    }

    /// Slot written last, `None` before the first sample
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<f32> {
        self.cursor.and_then(|c| self.samples[c])
    }

    /// Raw slot contents, in slot order
    pub fn slots(&self) -> &[Option<f32>] {
        &self.samples
    }

    /// Samples oldest first
    pub fn chronological(&self) -> Vec<f32> {
        let Some(cursor) = self.cursor else {
            return Vec::new();
        };
        let len = self.samples.len();
        (1..=len)
            .filter_map(|offset| self.samples[(cursor + offset) % len])
            .collect()
    }

    /// Whether the value appears anywhere in the ring
    pub fn contains(&self, value: f32) -> bool {
        self.samples.iter().flatten().any(|v| *v == value)
    }
}

impl Default for TemperatureHistory {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}
