//! RepRapFirmware 3 object-model decoder
//!
//! Responses to `M409` arrive wrapped as `{"key":"","flags":"d99fn","result":{..}}`.
//! With an empty key the result holds top-level sections; with a key such
//! as `"heat"` it holds just that section. Updates are partial: a section or
//! field that is missing or `null` leaves the snapshot untouched.

use super::json::{array_at, f32_at, field, i64_at, path, require_object, str_at, u64_at};
use super::{DecodeOutcome, Dialect};
use duetscreen_core::{HeaterState, MachineSnapshot, MachineStatus, Result, TimesLeft, Tool};
use serde_json::Value;

/// Sections in the order they are applied
///
/// Tools go before heat so readings land on the rebuilt tool list.
const SECTION_ORDER: [&str; 8] = [
    "state", "boards", "tools", "heat", "fans", "job", "move", "seqs",
];

/// Decode an object-model response, enveloped or bare
pub fn decode(payload: &Value, snapshot: &mut MachineSnapshot) -> Result<DecodeOutcome> {
    require_object(payload, "object model response")?;
    let mut outcome = DecodeOutcome::new(Dialect::ObjectModel);

    let (key, root) = match (payload.get("key"), payload.get("result")) {
        (Some(key), Some(result)) => (key.as_str().unwrap_or(""), result),
        _ => ("", payload),
    };
    if root.is_null() {
        tracing::debug!("object model key '{}' returned no result", key);
        return Ok(outcome);
    }

    if key.is_empty() {
        require_object(root, "object model result")?;
        for section in SECTION_ORDER {
            if let Some(value) = field(root, section) {
                decode_section(section, value, snapshot, &mut outcome);
            }
        }
    } else if key.contains('.') || key.contains('[') {
        tracing::debug!("object model key '{}' not decoded", key);
    } else {
        decode_section(key, root, snapshot, &mut outcome);
    }

    Ok(outcome)
}

fn decode_section(
    name: &str,
    value: &Value,
    snapshot: &mut MachineSnapshot,
    outcome: &mut DecodeOutcome,
) {
    match name {
        "state" => decode_state(value, snapshot),
        "boards" => decode_boards(value, snapshot),
        "tools" => outcome.tools_refreshed = decode_tools(value, snapshot),
        "heat" => decode_heat(value, snapshot),
        "fans" => decode_fans(value, snapshot),
        "job" => decode_job(value, snapshot),
        "move" => decode_move(value, snapshot),
        "seqs" => {
            if let Some(seq) = u64_at(value, "reply") {
                outcome.reply_changed = snapshot.seqs.observe_reply(seq);
            }
        }
        other => tracing::trace!("object model section '{}' ignored", other),
    }
}

fn decode_state(state: &Value, snapshot: &mut MachineSnapshot) {
    if let Some(status) = str_at(state, "status") {
        snapshot.status = MachineStatus::from_object_model(status);
    }
    if let Some(tool) = i64_at(state, "currentTool") {
        snapshot.current_tool = (tool >= 0).then_some(tool);
    }
}

fn decode_boards(boards: &Value, snapshot: &mut MachineSnapshot) {
    let Some(board) = boards
        .as_array()
        .and_then(|b| b.iter().find(|v| v.is_object()))
    else {
        return;
    };

    if let Some(temp) = path(board, &["mcuTemp", "current"]).and_then(Value::as_f64) {
        snapshot.board.mcu_temp = Some(temp as f32);
    }
    if let Some(name) = str_at(board, "firmwareName") {
        snapshot.firmware.name = Some(name.to_string());
    }
    if let Some(version) = str_at(board, "firmwareVersion") {
        snapshot.firmware.version = Some(version.to_string());
    }
    if let Some(board_name) = str_at(board, "name").or_else(|| str_at(board, "shortName")) {
        snapshot.firmware.board = Some(board_name.to_string());
    }
}

/// Rebuild the tool list, keeping fields the update leaves out
fn decode_tools(tools: &Value, snapshot: &mut MachineSnapshot) -> bool {
    let Some(entries) = tools.as_array() else {
        return false;
    };
    let previous: Vec<Tool> = snapshot.tools.iter().cloned().collect();

    let rebuilt = entries.iter().enumerate().filter_map(|(index, entry)| {
        if !entry.is_object() {
            return None;
        }
        let number = i64_at(entry, "number").unwrap_or(index as i64);
        let mut tool = previous
            .iter()
            .find(|t| t.number == number)
            .cloned()
            .unwrap_or_else(|| Tool::new(number));

        if let Some(name) = str_at(entry, "name") {
            tool.set_name(name);
        }
        if let Some(heaters) = array_at(entry, "heaters") {
            tool.heater = heaters.first().and_then(Value::as_u64).map(|h| h as usize);
        }
        if let Some(fans) = array_at(entry, "fans") {
            tool.fan = fans.first().and_then(Value::as_u64).map(|f| f as usize);
        }
        if let Some(active) = array_at(entry, "active").and_then(|a| a.first()) {
            if let Some(v) = active.as_f64() {
                tool.active = Some(v as f32);
            }
        }
        if let Some(standby) = array_at(entry, "standby").and_then(|s| s.first()) {
            if let Some(v) = standby.as_f64() {
                tool.standby = Some(v as f32);
            }
        }
        Some(tool)
    });

    let dropped = snapshot.tools.replace_with(rebuilt);
    if dropped > 0 {
        tracing::debug!("{} tools beyond the display limit ignored", dropped);
    }
    true
}

fn decode_heat(heat: &Value, snapshot: &mut MachineSnapshot) {
    if let Some(bed) = array_at(heat, "bedHeaters").and_then(|b| b.first()) {
        if let Some(index) = bed.as_i64() {
            snapshot.bed.heater = (index >= 0).then_some(index as usize);
        }
    }

    let Some(heaters) = array_at(heat, "heaters") else {
        return;
    };

    for (slot, heater) in heaters.iter().enumerate() {
        if let Some(state) = str_at(heater, "state") {
            snapshot.set_heater_state(slot, HeaterState::from_object_model(state));
        }
    }

    if let Some(heater) = snapshot.bed.heater.and_then(|b| heaters.get(b)) {
        if let Some(v) = f32_at(heater, "active") {
            snapshot.bed.active = Some(v);
        }
        if let Some(v) = f32_at(heater, "standby") {
            snapshot.bed.standby = Some(v);
        }
        if let Some(v) = f32_at(heater, "current") {
            snapshot.bed.history.push(v);
        }
    }

    for tool in snapshot.tools.iter_mut() {
        let reading = tool
            .heater
            .and_then(|h| heaters.get(h))
            .and_then(|h| f32_at(h, "current"));
        if let Some(v) = reading {
            tool.history.push(v);
        }
    }
}

/// Duty of the current tool's fan, or fan 0 when no tool is selected
fn decode_fans(fans: &Value, snapshot: &mut MachineSnapshot) {
    let Some(fans) = fans.as_array() else {
        return;
    };
    let index = snapshot
        .current_tool
        .and_then(|n| snapshot.tool_by_number(n))
        .and_then(|t| t.fan)
        .unwrap_or(0);

    let duty = fans
        .get(index)
        .and_then(|fan| f32_at(fan, "actualValue").or_else(|| f32_at(fan, "requestedValue")));
    if let Some(duty) = duty {
        snapshot.board.fan_percent = Some((duty * 100.0).clamp(0.0, 100.0));
    }
}

fn decode_job(job: &Value, snapshot: &mut MachineSnapshot) {
    let progress = &mut snapshot.job;

    if let Some(duration) = f32_at(job, "duration") {
        progress.duration = Some(duration);
    }
    if let Some(layer) = u64_at(job, "layer") {
        progress.layer = Some(layer as u32);
    }

    if let Some(file) = field(job, "file") {
        if let Some(name) = str_at(file, "fileName") {
            progress.set_file_name(name);
        }
        if let Some(v) = f32_at(file, "height") {
            progress.height = Some(v);
        }
        if let Some(v) = f32_at(file, "firstLayerHeight") {
            progress.first_layer_height = Some(v);
        }
        if let Some(v) = f32_at(file, "layerHeight") {
            progress.layer_height = Some(v);
        }
        if let Some(v) = f32_at(file, "simulatedTime") {
            progress.file_simulated_time = Some(v);
        }
        if let Some(v) = f32_at(file, "printTime") {
            progress.file_print_time = Some(v);
        }
        match u64_at(file, "numLayers") {
            Some(layers) if layers > 0 => progress.total_layers = Some(layers as u32),
            _ => progress.derive_total_layers(),
        }
    }

    if let Some(left) = field(job, "timesLeft") {
        progress.times_left = TimesLeft {
            simulation: f32_at(left, "simulation"),
            slicer: f32_at(left, "slicer"),
            file: f32_at(left, "file"),
        };
        progress.apply_times_left();
    }
}

fn decode_move(mv: &Value, snapshot: &mut MachineSnapshot) {
    let Some(axes) = array_at(mv, "axes") else {
        return;
    };

    for (i, entry) in axes.iter().enumerate() {
        if !entry.is_object() {
            continue;
        }
        let Some(axis) = snapshot.axis_mut(i) else {
            break;
        };
        if let Some(letter) = str_at(entry, "letter").and_then(|l| l.chars().next()) {
            axis.letter = letter;
        }
        if let Some(position) =
            f32_at(entry, "machinePosition").or_else(|| f32_at(entry, "userPosition"))
        {
            axis.position = Some(position);
        }
        if let Some(homed) = field(entry, "homed").and_then(Value::as_bool) {
            axis.homed = homed;
        }
        if let Some(v) = f32_at(entry, "min") {
            axis.min = Some(v);
        }
        if let Some(v) = f32_at(entry, "max") {
            axis.max = Some(v);
        }
        if let Some(v) = f32_at(entry, "babystep") {
            axis.babystep = Some(v);
        }
    }

    if axes.len() < snapshot.axes.len() {
        snapshot.axes.truncate(axes.len());
    }
}
