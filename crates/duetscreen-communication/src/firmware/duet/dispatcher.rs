//! Outbound G-code
//!
//! Commands typed or tapped on the panel go to the controller over the
//! active link. Only the WiFi link carries them; the serial link is used
//! for status queries alone.

use super::api::RemoteApi;
use super::json::u64_at;
use super::poller::LinkState;
use crate::communication::HttpChannel;
use duetscreen_core::Result;

/// What happened to a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted by the controller
    Sent,
    /// The active link cannot carry commands; the command was dropped
    Unsupported,
    /// No link; the command was dropped
    NotConnected,
}

/// Sends commands and keeps simple counters
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    sent: u64,
    dropped: u64,
    /// Free space in the controller's G-code buffer from the last reply
    buffer_space: Option<u64>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn buffer_space(&self) -> Option<u64> {
        self.buffer_space
    }

    /// Send `command` over the link described by `link`
    ///
    /// Transport and protocol failures are returned so the caller can react
    /// to an expired session.
    pub fn dispatch(
        &mut self,
        link: LinkState,
        http: &mut HttpChannel,
        command: &str,
    ) -> Result<DispatchOutcome> {
        let command = command.trim();
        match link {
            LinkState::WifiConnected => {
                let response = http.request(&RemoteApi::gcode(command))?;
                self.buffer_space = response.json().ok().and_then(|v| u64_at(&v, "buff"));
                self.sent += 1;
                tracing::debug!("sent '{}'", command);
                Ok(DispatchOutcome::Sent)
            }
            LinkState::SerialConnected => {
                self.dropped += 1;
                tracing::warn!("'{}' not sent: commands are not supported over serial", command);
                Ok(DispatchOutcome::Unsupported)
            }
            LinkState::Disconnected => {
                self.dropped += 1;
                tracing::warn!("'{}' not sent: no controller link", command);
                Ok(DispatchOutcome::NotConnected)
            }
        }
    }
}
