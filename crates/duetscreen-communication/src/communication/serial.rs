//! Serial port communication implementation
//!
//! Provides the byte channel used when the controller is reached over its
//! PanelDue UART instead of WiFi.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate and read timeout configuration
//! - Line-terminated sends with truncation reporting
//! - Bounded waits for inbound bytes

use super::{check_write, ByteChannel};
use duetscreen_core::{Error, Result, TransportError};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Line terminator appended to every outbound command
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Default UART speed of the PanelDue port
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports a controller could be attached to
///
/// Filters to the patterns a Duet shows up as:
/// - Windows: COM*
/// - Linux: /dev/ttyACM*, /dev/ttyUSB*, /dev/ttyS*, /dev/ttyAMA*
/// - macOS: /dev/cu.usbmodem*, /dev/cu.usbserial-*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        Error::other(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_candidate_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let info = info.with_usb_ids(usb.vid, usb.pid);
                    match usb.manufacturer {
                        Some(ref mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

fn is_candidate_port(port_name: &str) -> bool {
    if let Some(rest) = port_name.strip_prefix("COM") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit());
    }

    const PREFIXES: [&str; 6] = [
        "/dev/ttyACM",
        "/dev/ttyUSB",
        "/dev/ttyS",
        "/dev/ttyAMA",
        "/dev/cu.usbmodem",
        "/dev/cu.usbserial-",
    ];
    PREFIXES.iter().any(|p| port_name.starts_with(p))
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Low-level serial port interface
pub trait SerialPort: Send {
    /// Write data to the port
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read data from the port
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes waiting in the receive queue
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Get the port name
    fn name(&self) -> String;
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SerialParams {
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout handed to the OS driver
    pub read_timeout: Duration,
}

impl SerialParams {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// Real serial port implementation using serialport crate
pub struct RealSerialPort {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl RealSerialPort {
    /// Open a serial port with the given parameters, 8N1 without flow control
    pub fn open(params: &SerialParams) -> Result<Self> {
        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(params.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                TransportError::Io {
                    reason: format!("failed to open {}: {}", params.port, e),
                }
            })?;

        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);
        Ok(Self {
            name: params.port.clone(),
            port,
        })
    }
}

impl SerialPort for RealSerialPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::other)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Byte channel over a serial port
///
/// The port is optional so a channel can exist before the UART is opened;
/// every operation on an unopened channel fails with `NotInitialized`.
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    write_warning: Option<TransportError>,
}

impl SerialChannel {
    /// Channel with no port attached
    pub fn unopened() -> Self {
        Self {
            port: None,
            write_warning: None,
        }
    }

    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port: Some(port),
            write_warning: None,
        }
    }

    /// Open the UART described by `params`
    pub fn open(params: &SerialParams) -> Result<Self> {
        Ok(Self::new(Box::new(RealSerialPort::open(params)?)))
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            TransportError::NotInitialized {
                link: "serial".to_string(),
            }
            .into()
        })
    }
}

fn io_error(e: io::Error) -> Error {
    TransportError::Io {
        reason: e.to_string(),
    }
    .into()
}

impl ByteChannel for SerialChannel {
    /// Writes `data` followed by CRLF; the count excludes the terminator
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.write_warning = None;
        let port = self.port_mut()?;
        let written = port.write(data).map_err(io_error)?.min(data.len());
        let warning = if written == data.len() {
            let tail = port.write(LINE_TERMINATOR).map_err(io_error)?;
            check_write("serial", tail, LINE_TERMINATOR.len())
        } else {
            check_write("serial", written, data.len())
        };
        tracing::trace!("serial tx: {}", String::from_utf8_lossy(&data[..written]));
        self.write_warning = warning;
        Ok(written)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.port_mut()?.bytes_to_read().map_err(io_error)
    }

    fn read(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize> {
        let port = self.port_mut()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let deadline = Instant::now() + wait;
        loop {
            match port.read(buf) {
                Ok(0) => {}
                Ok(n) => return Ok(n),
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(io_error(e)),
            }
            if Instant::now() >= deadline {
                return Ok(0);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn name(&self) -> String {
        self.port
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| "serial (closed)".to_string())
    }

    fn take_write_warning(&mut self) -> Option<TransportError> {
        self.write_warning.take()
    }
}
