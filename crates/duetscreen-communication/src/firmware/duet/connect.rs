//! `rr_connect` response
//!
//! `err` is 0 on success, 1 for a wrong password and 2 when the controller
//! has no free session.

use super::json::require_object;
use duetscreen_core::{ProtocolError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Session details returned by a successful connect
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectInfo {
    #[serde(rename = "sessionTimeout", default)]
    pub session_timeout_ms: Option<u64>,
    #[serde(rename = "boardType", default)]
    pub board_type: Option<String>,
    #[serde(rename = "apiLevel", default)]
    pub api_level: Option<u64>,
}

#[derive(Deserialize)]
struct ConnectReply {
    #[serde(default)]
    err: Option<i64>,
    #[serde(flatten)]
    info: ConnectInfo,
}

pub fn decode(payload: &Value) -> Result<ConnectInfo> {
    require_object(payload, "rr_connect response")?;
    let reply = ConnectReply::deserialize(payload).map_err(|e| ProtocolError::UnexpectedPayload {
        reason: format!("rr_connect response: {}", e),
    })?;
    match reply.err {
        Some(0) | None => Ok(reply.info),
        Some(code) => Err(ProtocolError::AuthRejected { code }.into()),
    }
}
