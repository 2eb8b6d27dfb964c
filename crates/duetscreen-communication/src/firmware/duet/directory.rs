//! `rr_filelist` decoder
//!
//! ```json
//! {"dir":"0:/gcodes","first":0,"files":[
//!   {"type":"d","name":"parts","size":0,"date":"2024-01-02T10:00:00"},
//!   {"type":"f","name":"benchy.gcode","size":1843210,"date":"2024-01-03T12:30:00"}],"next":0}
//! ```
//! A failed listing is `{"err":2}` and leaves the current listing alone.

use super::json::{array_at, check_err, field, require_object, str_at, u64_at};
use duetscreen_core::{
    EntryKind, ListingEntry, ListingKind, MachineSnapshot, ProtocolError, Result,
};
use serde_json::Value;

/// Replace the listing that `requested_dir` belongs to
///
/// The listing is chosen from the directory that was asked for, not the
/// one echoed back, so a reply cannot land in the wrong list. Returns the
/// listing that changed.
pub fn decode(
    payload: &Value,
    requested_dir: &str,
    snapshot: &mut MachineSnapshot,
) -> Result<ListingKind> {
    require_object(payload, "rr_filelist response")?;
    check_err(payload)?;

    let kind = ListingKind::from_directory(requested_dir).ok_or_else(|| {
        ProtocolError::UnexpectedPayload {
            reason: format!("no listing holds directory {}", requested_dir),
        }
    })?;
    let files = array_at(payload, "files").ok_or_else(|| ProtocolError::UnexpectedPayload {
        reason: "rr_filelist response has no files array".to_string(),
    })?;

    let entries: Vec<ListingEntry> = files.iter().filter_map(entry).collect();
    let directory = str_at(payload, "dir").unwrap_or(requested_dir);

    let listing = snapshot.listings.get_mut(kind);
    let dropped = listing.refresh(directory, entries);
    if dropped > 0 {
        tracing::debug!("{} listing full, {} entries dropped", kind, dropped);
    }

    if u64_at(payload, "next").is_some_and(|next| next != 0) {
        tracing::debug!("{} listing truncated by controller", kind);
    }
    Ok(kind)
}

fn entry(file: &Value) -> Option<ListingEntry> {
    let name = str_at(file, "name")?;
    let kind = match str_at(file, "type") {
        Some("d") => EntryKind::Folder,
        Some("f") => EntryKind::File,
        _ => EntryKind::Empty,
    };
    let mut entry = ListingEntry::new(name, kind);
    entry.size = u64_at(file, "size");
    entry.modified = field(file, "date")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(entry)
}
