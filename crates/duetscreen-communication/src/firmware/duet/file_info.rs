//! `rr_fileinfo` decoder
//!
//! Without a `name` argument the controller describes the file being
//! printed, which is how the job's name and layer geometry get filled in
//! once a print starts.

use super::json::{check_err, f32_at, require_object, str_at, u64_at};
use duetscreen_core::{MachineSnapshot, Result};
use serde_json::Value;

/// Fill job metadata from a file-info response
pub fn decode(payload: &Value, snapshot: &mut MachineSnapshot) -> Result<()> {
    require_object(payload, "rr_fileinfo response")?;
    check_err(payload)?;

    let job = &mut snapshot.job;
    if let Some(name) = str_at(payload, "fileName") {
        let base = name.rsplit('/').next().unwrap_or(name);
        job.set_file_name(base);
    }
    if let Some(v) = f32_at(payload, "height") {
        job.height = Some(v);
    }
    if let Some(v) = f32_at(payload, "firstLayerHeight") {
        job.first_layer_height = Some(v);
    }
    if let Some(v) = f32_at(payload, "layerHeight") {
        job.layer_height = Some(v);
    }
    if let Some(v) = f32_at(payload, "printTime") {
        job.file_print_time = Some(v);
    }
    if let Some(v) = f32_at(payload, "simulatedTime") {
        job.file_simulated_time = Some(v);
    }
    if let Some(v) = f32_at(payload, "printDuration") {
        job.duration = Some(v);
    }

    match u64_at(payload, "numLayers") {
        Some(layers) if layers > 0 => job.total_layers = Some(layers as u32),
        _ => job.derive_total_layers(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_active_job_info() {
        let mut snapshot = MachineSnapshot::new();
        let payload = json!({
            "err": 0,
            "fileName": "0:/gcodes/parts/bracket.gcode",
            "height": 10.3,
            "firstLayerHeight": 0.3,
            "layerHeight": 0.2,
            "printTime": 3600,
            "simulatedTime": null,
            "printDuration": 120
        });
        decode(&payload, &mut snapshot).unwrap();

        let job = &snapshot.job;
        assert_eq!(job.file_name.as_deref(), Some("bracket.gcode"));
        assert_eq!(job.total_layers, Some(51));
        assert_eq!(job.file_print_time, Some(3600.0));
        assert_eq!(job.file_simulated_time, None);
        assert_eq!(job.duration, Some(120.0));
    }

    #[test]
    fn test_error_response() {
        let mut snapshot = MachineSnapshot::new();
        assert!(decode(&json!({"err": 1}), &mut snapshot).is_err());
        assert!(snapshot.job.file_name.is_none());
    }
}
