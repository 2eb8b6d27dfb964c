//! RepRapFirmware (Duet) support
//!
//! Two response dialects fill the same [`MachineSnapshot`]:
//! - Legacy `rr_status` objects with single-letter status codes and
//!   positional arrays
//! - Object-model responses, keyed by section name and possibly wrapped in
//!   a `{"key","flags","result"}` envelope
//!
//! Decoders never see the transport. They take a parsed payload and a
//! mutable snapshot, so they can be driven from HTTP, serial or tests alike.

pub mod api;
pub mod config;
pub mod connect;
pub mod directory;
pub mod dispatcher;
pub mod file_info;
pub mod json;
pub mod legacy;
pub mod object_model;
pub mod poller;

pub use api::RemoteApi;
pub use connect::ConnectInfo;
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use poller::{ExtendedRefresh, LinkState, Poller, PollerConfig, TickOutcome};

use duetscreen_core::{MachineSnapshot, ProtocolError, Result};
use serde_json::Value;
use std::fmt;

/// Response dialect of a status payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// RepRapFirmware 1.x/2.x `rr_status`
    LegacyStatus,
    /// RepRapFirmware 3.x object model
    ObjectModel,
}

impl Dialect {
    /// Guess the dialect from the payload shape
    pub fn detect(payload: &Value) -> Option<Self> {
        let obj = payload.as_object()?;

        if obj.contains_key("key") && obj.contains_key("result") {
            return Some(Self::ObjectModel);
        }

        let status_is_char = obj
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(|s| s.chars().count() == 1);
        if status_is_char || obj.contains_key("coords") || obj.contains_key("temps") {
            return Some(Self::LegacyStatus);
        }

        const SECTIONS: [&str; 8] = [
            "boards", "fans", "heat", "job", "move", "seqs", "state", "tools",
        ];
        if SECTIONS.iter().any(|s| obj.contains_key(*s)) {
            return Some(Self::ObjectModel);
        }
        None
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LegacyStatus => write!(f, "legacy rr_status"),
            Self::ObjectModel => write!(f, "object model"),
        }
    }
}

/// Legacy status query type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// `type=1`: temperatures, positions, status
    Lightweight,
    /// `type=2`: adds tool definitions and firmware identity
    Extended,
    /// `type=3`: adds job progress
    Job,
}

impl StatusKind {
    pub fn code(&self) -> u8 {
        match self {
            Self::Lightweight => 1,
            Self::Extended => 2,
            Self::Job => 3,
        }
    }
}

/// What a status decode changed beyond plain field updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub dialect: Dialect,
    /// The console reply counter moved; the reply should be fetched
    pub reply_changed: bool,
    /// The tool list was rebuilt from the payload
    pub tools_refreshed: bool,
}

impl DecodeOutcome {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            reply_changed: false,
            tools_refreshed: false,
        }
    }
}

/// Decode a status payload into `snapshot` with the dialect the request
/// implies
///
/// `kind` only matters to the legacy dialect, where it gates the tool pass.
pub fn decode_status(
    dialect: Dialect,
    payload: &Value,
    snapshot: &mut MachineSnapshot,
    kind: StatusKind,
) -> Result<DecodeOutcome> {
    match dialect {
        Dialect::LegacyStatus => legacy::decode(payload, snapshot, kind),
        Dialect::ObjectModel => object_model::decode(payload, snapshot),
    }
}

/// Decode a payload whose dialect is not known from the request
pub fn decode_detected(
    payload: &Value,
    snapshot: &mut MachineSnapshot,
    kind: StatusKind,
) -> Result<DecodeOutcome> {
    let dialect = Dialect::detect(payload).ok_or_else(|| ProtocolError::UnexpectedPayload {
        reason: "status payload matches neither dialect".to_string(),
    })?;
    decode_status(dialect, payload, snapshot, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_dialects() {
        assert_eq!(
            Dialect::detect(&json!({"status": "I", "coords": {}})),
            Some(Dialect::LegacyStatus)
        );
        assert_eq!(
            Dialect::detect(&json!({"key": "", "flags": "d99fn", "result": {}})),
            Some(Dialect::ObjectModel)
        );
        assert_eq!(
            Dialect::detect(&json!({"state": {"status": "idle"}})),
            Some(Dialect::ObjectModel)
        );
        assert_eq!(Dialect::detect(&json!({"unrelated": 1})), None);
        assert_eq!(Dialect::detect(&json!([1, 2])), None);
    }

    #[test]
    fn test_dialect_follows_request() {
        let mut snapshot = MachineSnapshot::new();
        let payload = json!({"state": {"status": "idle"}});
        let outcome =
            decode_status(Dialect::ObjectModel, &payload, &mut snapshot, StatusKind::Job).unwrap();
        assert_eq!(outcome.dialect, Dialect::ObjectModel);
        assert_eq!(snapshot.status, duetscreen_core::MachineStatus::Idle);
    }

    #[test]
    fn test_unknown_payload_rejected() {
        let mut snapshot = MachineSnapshot::new();
        let err = decode_detected(&json!({"foo": 1}), &mut snapshot, StatusKind::Lightweight)
            .unwrap_err();
        assert!(err.is_protocol_error());
        assert_eq!(snapshot, MachineSnapshot::new());
    }
}
