//! Transports to the controller
//!
//! Both links present the same byte-channel surface: send a request, ask how
//! many bytes are waiting and read into a caller buffer with a bounded wait.
//! Frame assembly on top of that lives in [`frame`].

pub mod encoding;
pub mod frame;
pub mod http;
pub mod serial;

use duetscreen_core::{Result, TransportError};
use std::time::Duration;

pub use encoding::percent_encode;
pub use frame::{FrameConfig, LineFrameAssembler, ResponseBuffer};
pub use http::{HttpBackend, HttpChannel, HttpResponse, ReqwestBackend};
pub use serial::{list_ports, RealSerialPort, SerialChannel, SerialParams, SerialPort, SerialPortInfo};

/// Byte-level link to the controller
pub trait ByteChannel: Send {
    /// Send one request. Returns the number of request bytes accepted, which
    /// may be fewer than `data.len()`.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Number of inbound bytes that can be read without waiting
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes, waiting at most `wait` for the first
    /// one. `Ok(0)` means nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize>;

    /// Human readable link name for logs
    fn name(&self) -> String;

    /// Truncation reported by the last `send`, cleared by this call
    fn take_write_warning(&mut self) -> Option<TransportError> {
        None
    }
}

/// Log a short write and describe it as a warning
pub(crate) fn check_write(
    link: &str,
    written: usize,
    requested: usize,
) -> Option<TransportError> {
    if written >= requested {
        return None;
    }
    let warning = TransportError::WriteTruncated { written, requested };
    tracing::warn!("{}: {}", link, warning);
    Some(warning)
}
