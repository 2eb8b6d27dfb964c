//! # DuetScreen Communication
//!
//! Transports and firmware support for talking to a Duet controller.
//! Supports the WiFi HTTP API and the PanelDue serial port.
//! Includes decoders for both RepRapFirmware status dialects and the poller
//! that keeps the shared machine snapshot current.

pub mod communication;
pub mod firmware;

pub use communication::{
    list_ports, percent_encode, ByteChannel, FrameConfig, HttpBackend, HttpChannel,
    HttpResponse, LineFrameAssembler, RealSerialPort, ReqwestBackend, ResponseBuffer,
    SerialChannel, SerialParams, SerialPort, SerialPortInfo,
};

pub use firmware::{
    CommandDispatcher, DecodeOutcome, Dialect, DispatchOutcome, ExtendedRefresh, LinkState,
    LinkWatch, LinkWatchState, Poller, PollerConfig, RemoteApi, StatusKind, TickOutcome,
};
