//! Legacy `rr_status` decoder
//!
//! Example lightweight response (`type=1`):
//! ```json
//! {"status":"I","coords":{"axesHomed":[1,1,1],"xyz":[0,0,5.2],"machine":[0,0,5.2]},
//!  "temps":{"bed":{"current":60.1,"active":60,"standby":0,"state":2,"heater":0},
//!           "current":[60.1,205.3],"state":[2,2],
//!           "tools":{"active":[[205]],"standby":[[0]]}},
//!  "params":{"fanPercent":[100,0]},"currentTool":0,"seq":4}
//! ```
//! `type=2` adds `tools` and `firmwareName`; `type=3` adds the job fields.
//!
//! Heaters are classified first so the tool pass can look up slots, then the
//! tool list is rebuilt on extended responses, then a shared pass fills
//! per-tool readings by each tool's heater index.

use super::json::{
    array_at, f32_array, f32_at, field, i64_at, path, require_object, str_at, u64_at,
};
use super::{DecodeOutcome, Dialect, StatusKind};
use duetscreen_core::{HeaterState, MachineSnapshot, MachineStatus, Result, Tool, MAX_HEATERS};
use serde_json::Value;

/// Decode a legacy status response
pub fn decode(
    payload: &Value,
    snapshot: &mut MachineSnapshot,
    kind: StatusKind,
) -> Result<DecodeOutcome> {
    require_object(payload, "rr_status response")?;
    let mut outcome = DecodeOutcome::new(Dialect::LegacyStatus);

    if let Some(c) = str_at(payload, "status").and_then(|s| s.chars().next()) {
        snapshot.status = MachineStatus::from_status_char(c);
    }

    let temps = field(payload, "temps");
    if let Some(temps) = temps {
        decode_heater_states(temps, snapshot);
        decode_bed(temps, snapshot);
    }

    if kind == StatusKind::Extended {
        if let Some(tools) = array_at(payload, "tools") {
            rebuild_tools(tools, snapshot);
            outcome.tools_refreshed = true;
        }
        decode_identity(payload, snapshot);
    }

    if let Some(temps) = temps {
        decode_tool_temperatures(temps, snapshot);
    }

    if let Some(tool) = i64_at(payload, "currentTool") {
        snapshot.current_tool = (tool >= 0).then_some(tool);
    }

    decode_coords(payload, snapshot);
    decode_fan(payload, snapshot);
    decode_job(payload, snapshot);

    if let Some(seq) = u64_at(payload, "seq") {
        outcome.reply_changed = snapshot.seqs.observe_reply(seq);
    }

    Ok(outcome)
}

/// First pass: per-slot heater state, bed at slot 0
fn decode_heater_states(temps: &Value, snapshot: &mut MachineSnapshot) {
    if let Some(states) = array_at(temps, "state") {
        for (slot, code) in states.iter().enumerate().take(MAX_HEATERS) {
            if let Some(code) = code.as_i64() {
                snapshot.set_heater_state(slot, HeaterState::from_code(code));
            }
        }
    }
}

fn decode_bed(temps: &Value, snapshot: &mut MachineSnapshot) {
    let Some(bed) = field(temps, "bed") else {
        return;
    };

    let heater = match i64_at(bed, "heater") {
        Some(h) if h >= 0 => h as usize,
        Some(_) => return,
        None => snapshot.bed.heater.unwrap_or(0),
    };
    snapshot.bed.heater = Some(heater);

    if let Some(v) = f32_at(bed, "active") {
        snapshot.bed.active = Some(v);
    }
    if let Some(v) = f32_at(bed, "standby") {
        snapshot.bed.standby = Some(v);
    }
    if let Some(code) = i64_at(bed, "state") {
        snapshot.set_heater_state(heater, HeaterState::from_code(code));
    }

    let current = f32_at(bed, "current")
        .or_else(|| f32_array(temps, "current").get(heater).copied().flatten());
    if let Some(current) = current {
        snapshot.bed.history.push(current);
    }
}

/// Second pass: tool identities from an extended response
///
/// Tools keep their temperature history across rebuilds when the tool
/// number is unchanged.
fn rebuild_tools(tools: &[Value], snapshot: &mut MachineSnapshot) {
    let previous: Vec<Tool> = snapshot.tools.iter().cloned().collect();

    let rebuilt = tools.iter().enumerate().filter_map(|(index, entry)| {
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
        tool.heater = array_at(entry, "heaters")
            .and_then(|h| h.first())
            .and_then(Value::as_u64)
            .map(|h| h as usize);
        tool.fan = first_fan(entry);
        Some(tool)
    });

    let dropped = snapshot.tools.replace_with(rebuilt);
    if dropped > 0 {
        tracing::debug!("{} tools beyond the display limit ignored", dropped);
    }
}

/// `fans` is a bitmap on older firmware and an index array on newer
fn first_fan(entry: &Value) -> Option<usize> {
    match field(entry, "fans")? {
        Value::Number(n) => {
            let bits = n.as_u64()?;
            (bits != 0).then(|| bits.trailing_zeros() as usize)
        }
        Value::Array(items) => items.first()?.as_u64().map(|f| f as usize),
        _ => None,
    }
}

fn decode_identity(payload: &Value, snapshot: &mut MachineSnapshot) {
    if let Some(name) = str_at(payload, "firmwareName") {
        snapshot.firmware.name = Some(name.to_string());
    }
    if let Some(version) = str_at(payload, "firmwareVersion") {
        snapshot.firmware.version = Some(version.to_string());
    }
    if let Some(board) = str_at(payload, "firmwareElectronics") {
        snapshot.firmware.board = Some(board.to_string());
    }
}

/// Shared pass: readings and setpoints per tool
///
/// `temps.tools.active` and `temps.tools.standby` are indexed by tool
/// position and hold one value per tool heater.
fn decode_tool_temperatures(temps: &Value, snapshot: &mut MachineSnapshot) {
    let current = f32_array(temps, "current");
    let active = path(temps, &["tools", "active"]);
    let standby = path(temps, &["tools", "standby"]);

    for (position, tool) in snapshot.tools.iter_mut().enumerate() {
        if let Some(reading) = tool.heater.and_then(|h| current.get(h).copied().flatten()) {
            tool.history.push(reading);
        }
        if let Some(v) = active.and_then(|a| nested_first(a, position)) {
            tool.active = Some(v);
        }
        if let Some(v) = standby.and_then(|s| nested_first(s, position)) {
            tool.standby = Some(v);
        }
    }
}

fn nested_first(rows: &Value, index: usize) -> Option<f32> {
    match rows.as_array()?.get(index)? {
        Value::Array(values) => values.first()?.as_f64().map(|v| v as f32),
        other => other.as_f64().map(|v| v as f32),
    }
}

fn decode_coords(payload: &Value, snapshot: &mut MachineSnapshot) {
    let Some(coords) = field(payload, "coords") else {
        return;
    };

    if let Some(homed) = array_at(coords, "axesHomed") {
        for (i, flag) in homed.iter().enumerate() {
            if let (Some(flag), Some(axis)) = (flag.as_i64(), snapshot.axis_mut(i)) {
                axis.homed = flag != 0;
            }
        }
    }

    let positions = match f32_array(coords, "machine") {
        machine if !machine.is_empty() => machine,
        _ => f32_array(coords, "xyz"),
    };
    for (i, position) in positions.into_iter().enumerate() {
        if let (Some(position), Some(axis)) = (position, snapshot.axis_mut(i)) {
            axis.position = Some(position);
        }
    }

    if let Some(babystep) = f32_at(payload, "babystep") {
        if let Some(z) = snapshot.axis_mut(2) {
            z.babystep = Some(babystep);
        }
    }
}

/// Fan duty of the current tool's fan, falling back to fan 0
fn decode_fan(payload: &Value, snapshot: &mut MachineSnapshot) {
    let Some(fans) = path(payload, &["params", "fanPercent"]).and_then(Value::as_array) else {
        return;
    };
    let fan = snapshot
        .current_tool
        .and_then(|n| snapshot.tool_by_number(n))
        .and_then(|t| t.fan)
        .unwrap_or(0);
    if let Some(duty) = fans.get(fan).and_then(Value::as_f64) {
        snapshot.board.fan_percent = Some(duty as f32);
    }
}

fn decode_job(payload: &Value, snapshot: &mut MachineSnapshot) {
    let job = &mut snapshot.job;

    // reported as a percentage despite the name
    if let Some(done) = f32_at(payload, "fractionPrinted") {
        job.percent = Some(done.clamp(0.0, 100.0));
    }
    if let Some(duration) = f32_at(payload, "printDuration") {
        job.duration = Some(duration);
    }
    if let Some(layer) = u64_at(payload, "currentLayer") {
        job.layer = Some(layer as u32);
    }
    if let Some(first) = f32_at(payload, "firstLayerHeight") {
        job.first_layer_height = Some(first);
    }
    if let Some(left) = field(payload, "timesLeft") {
        let legacy = &mut job.legacy_times_left;
        if let Some(v) = f32_at(left, "file") {
            legacy.file = Some(v);
        }
        if let Some(v) = f32_at(left, "filament") {
            legacy.filament = Some(v);
        }
        if let Some(v) = f32_at(left, "layer") {
            legacy.layer = Some(v);
        }
    }
}
