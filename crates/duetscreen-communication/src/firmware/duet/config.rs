//! `rr_config` decoder: firmware identity and axis limits

use super::json::{check_err, f32_array, require_object, str_at};
use duetscreen_core::{MachineSnapshot, Result};
use serde_json::Value;

pub fn decode(payload: &Value, snapshot: &mut MachineSnapshot) -> Result<()> {
    require_object(payload, "rr_config response")?;
    check_err(payload)?;

    if let Some(name) = str_at(payload, "firmwareName") {
        snapshot.firmware.name = Some(name.to_string());
    }
    if let Some(version) = str_at(payload, "firmwareVersion") {
        snapshot.firmware.version = Some(version.to_string());
    }
    if let Some(board) = str_at(payload, "firmwareElectronics") {
        snapshot.firmware.board = Some(board.to_string());
    }

    for (i, min) in f32_array(payload, "axisMins").into_iter().enumerate() {
        if let (Some(min), Some(axis)) = (min, snapshot.axis_mut(i)) {
            axis.min = Some(min);
        }
    }
    for (i, max) in f32_array(payload, "axisMaxes").into_iter().enumerate() {
        if let (Some(max), Some(axis)) = (max, snapshot.axis_mut(i)) {
            axis.max = Some(max);
        }
    }
    Ok(())
}
