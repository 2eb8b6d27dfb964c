//! Scripted fakes standing in for the controller

#![allow(dead_code)]

use duetscreen_communication::communication::{HttpBackend, SerialPort};
use duetscreen_core::{Result, TransportError};
use std::collections::VecDeque;
use std::io;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const BASE: &str = "http://duet.local";

struct Route {
    prefix: String,
    responses: VecDeque<(u16, String)>,
}

#[derive(Default)]
struct Script {
    routes: Vec<Route>,
    log: Vec<String>,
}

/// HTTP backend answering from per-path response queues
///
/// The longest matching path prefix wins. Each route replays its queued
/// responses in order and keeps repeating the last one.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for paths starting with `prefix`
    pub fn respond(&self, prefix: &str, status: u16, body: &str) -> &Self {
        let mut script = self.script.lock();
        let response = (status, body.to_string());
        match script.routes.iter_mut().find(|r| r.prefix == prefix) {
            Some(route) => route.responses.push_back(response),
            None => script.routes.push(Route {
                prefix: prefix.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    /// Replace whatever is queued for `prefix`
    pub fn replace(&self, prefix: &str, status: u16, body: &str) -> &Self {
        self.script.lock().routes.retain(|r| r.prefix != prefix);
        self.respond(prefix, status, body)
    }

    /// Request paths in the order they were issued
    pub fn requests(&self) -> Vec<String> {
        self.script.lock().log.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }

    pub fn clear_log(&self) {
        self.script.lock().log.clear();
    }
}

impl HttpBackend for ScriptedBackend {
    fn get(
        &mut self,
        url: &str,
        _timeout: Duration,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<u16> {
        let path = url.strip_prefix(BASE).unwrap_or(url).to_string();
        let mut script = self.script.lock();
        script.log.push(path.clone());

        let route = script
            .routes
            .iter_mut()
            .filter(|r| path.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());
        let Some(route) = route else {
            return Err(TransportError::Http {
                reason: format!("no route for {}", path),
            }
            .into());
        };

        let (status, body) = if route.responses.len() > 1 {
            route.responses.pop_front().unwrap()
        } else {
            route.responses.front().cloned().unwrap()
        };
        for chunk in body.as_bytes().chunks(64) {
            if !sink(chunk) {
                break;
            }
        }
        Ok(status)
    }
}

#[derive(Default)]
struct Wire {
    written: Vec<u8>,
    inbound: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    write_limit: Option<usize>,
}

/// Serial port that answers each complete line with the next scripted reply
#[derive(Clone, Default)]
pub struct LoopbackPort {
    wire: Arc<Mutex<Wire>>,
}

impl LoopbackPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes sent back after the next line written
    pub fn reply(&self, bytes: &[u8]) -> &Self {
        self.wire.lock().replies.push_back(bytes.to_vec());
        self
    }

    /// Bytes available immediately, without waiting for a line
    pub fn inject(&self, bytes: &[u8]) {
        self.wire.lock().inbound.extend(bytes);
    }

    /// Accept at most `limit` bytes per write
    pub fn limit_writes(&self, limit: usize) {
        self.wire.lock().write_limit = Some(limit);
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.wire.lock().written).into_owned()
    }

    pub fn pending(&self) -> usize {
        self.wire.lock().inbound.len()
    }
}

impl SerialPort for LoopbackPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock();
        let n = wire.write_limit.map_or(data.len(), |l| l.min(data.len()));
        wire.written.extend_from_slice(&data[..n]);
        if data[..n].ends_with(b"\n") {
            if let Some(reply) = wire.replies.pop_front() {
                wire.inbound.extend(reply);
            }
        }
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock();
        let n = buf.len().min(wire.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = wire.inbound.pop_front().unwrap();
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.wire.lock().inbound.len())
    }

    fn name(&self) -> String {
        "loopback".to_string()
    }
}

pub const CONFIG: &str = r#"{"axisMins":[0,0,0],"axisMaxes":[230,210,200],"firmwareName":"RepRapFirmware","firmwareVersion":"2.05.1","firmwareElectronics":"Duet WiFi 1.02 or later"}"#;

pub const FILAMENTS: &str = r#"{"dir":"0:/filaments","first":0,"files":[{"type":"d","name":"PLA"},{"type":"d","name":"PETG"}],"next":0}"#;

pub const EXTENDED: &str = r#"{"status":"I","temps":{"bed":{"current":21.0,"active":0,"standby":0,"state":0,"heater":0},"current":[21.0,22.0],"state":[0,0],"tools":{"active":[[0]],"standby":[[0]]}},"tools":[{"number":0,"name":"E0","heaters":[1],"fans":1}],"firmwareName":"RepRapFirmware","currentTool":-1,"seq":1}"#;

pub const IDLE: &str = r#"{"status":"I","temps":{"bed":{"current":21.5},"current":[21.5,22.5],"state":[0,0]},"seq":1}"#;

pub const PRINTING: &str = r#"{"status":"P","temps":{"bed":{"current":60.0},"current":[60.0,205.0],"state":[2,2]},"seq":1}"#;

pub const JOB: &str = r#"{"status":"P","temps":{"bed":{"current":60.1},"current":[60.1,205.1],"state":[2,2]},"fractionPrinted":12.5,"printDuration":95,"currentLayer":3,"seq":1}"#;

pub const FILE_INFO: &str = r#"{"err":0,"fileName":"0:/gcodes/benchy.gcode","height":48.1,"firstLayerHeight":0.3,"layerHeight":0.2,"printTime":5400}"#;

/// Backend answering every request a healthy idle controller would get
pub fn idle_controller() -> ScriptedBackend {
    let backend = ScriptedBackend::new();
    backend
        .respond("/rr_config", 200, CONFIG)
        .respond("/rr_filelist?dir=0%3A%2Ffilaments", 200, FILAMENTS)
        .respond("/rr_status?type=2", 200, EXTENDED)
        .respond("/rr_status?type=1", 200, IDLE)
        .respond("/rr_status?type=3", 200, JOB)
        .respond("/rr_fileinfo", 200, FILE_INFO)
        .respond("/rr_reply", 200, "ok\n")
        .respond("/rr_connect", 200, r#"{"err":0,"sessionTimeout":8000,"boardType":"duetwifi102"}"#)
        .respond("/rr_gcode", 200, r#"{"buff":240}"#);
    backend
}
