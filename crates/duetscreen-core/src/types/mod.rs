//! Handles shared between the poller, its timers and the UI.

pub mod aliases;

pub use aliases::*;
