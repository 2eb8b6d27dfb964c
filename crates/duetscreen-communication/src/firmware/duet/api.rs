//! Request builders for the controller's HTTP API and serial queries

use super::StatusKind;
use crate::communication::percent_encode;
use chrono::{DateTime, Local, TimeZone};
use duetscreen_core::ListingKind;

/// Object-model flags for the serial status query: `d99` nests to depth 99,
/// `f` limits the reply to frequently changing values and `n` keeps null
/// values in place so array slots line up with heater and tool numbers
pub const DEFAULT_OBJECT_MODEL_FLAGS: &str = "d99fn";

/// Builds request paths relative to the controller's base URL
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteApi;

impl RemoteApi {
    /// `rr_connect` with the password and the panel's local time
    ///
    /// The controller sets its clock from `time` when it has none.
    pub fn connect<Tz: TimeZone>(password: &str, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "/rr_connect?password={}&time={}",
            percent_encode(password),
            percent_encode(&now.format("%Y-%m-%dT%H:%M:%S").to_string())
        )
    }

    /// [`RemoteApi::connect`] stamped with the current local time
    pub fn connect_now(password: &str) -> String {
        Self::connect(password, &Local::now())
    }

    pub fn status(kind: StatusKind) -> String {
        format!("/rr_status?type={}", kind.code())
    }

    pub fn gcode(command: &str) -> String {
        format!("/rr_gcode?gcode={}", percent_encode(command))
    }

    pub fn reply() -> &'static str {
        "/rr_reply"
    }

    pub fn config() -> &'static str {
        "/rr_config"
    }

    pub fn file_list(directory: &str) -> String {
        format!("/rr_filelist?dir={}", percent_encode(directory))
    }

    /// Listing request for the root directory of `kind`
    pub fn listing(kind: ListingKind) -> String {
        Self::file_list(kind.root_directory())
    }

    /// File metadata; `None` asks about the file being printed
    pub fn file_info(name: Option<&str>) -> String {
        match name {
            Some(name) => format!("/rr_fileinfo?name={}", percent_encode(name)),
            None => "/rr_fileinfo".to_string(),
        }
    }

    pub fn download(name: &str) -> String {
        format!("/rr_download?name={}", percent_encode(name))
    }

    /// Serial object-model query
    pub fn object_model_query(flags: &str) -> String {
        format!("M409 F\"{}\"", flags)
    }
}
