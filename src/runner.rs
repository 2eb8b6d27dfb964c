//! Wiring between the configuration and the polling core
//!
//! Everything here runs on the binary's side of the poller: loading the
//! configuration with its settings store, building the transports from
//! [`Config`], standing in for the WiFi provider with a
//! reachability probe, and rendering the snapshot as a status line.

use anyhow::Context;
use duetscreen_communication::communication::{
    list_ports, FrameConfig, HttpChannel, LineFrameAssembler, ReqwestBackend, SerialChannel,
    SerialParams,
};
use duetscreen_communication::firmware::{LinkState, Poller, PollerConfig};
use duetscreen_core::{shared_snapshot, ConnectivityEvent, MachineSnapshot};
use duetscreen_settings::{Config, FileStore, KeyValueStore, SerialSettings, STORE_FILE_NAME};
use std::fmt::Write as _;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port probed when the controller address carries none
const HTTP_PORT: u16 = 80;

/// Settings store belonging to a configuration file
pub fn store_path(config_path: &Path) -> PathBuf {
    config_path.with_file_name(STORE_FILE_NAME)
}

/// Load the configuration file, then overlay the values saved in its store
///
/// Either file may be missing; defaults fill in whatever neither provides.
pub fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let store_path = store_path(config_path);
    let store = FileStore::open(&store_path)
        .with_context(|| format!("opening settings store {}", store_path.display()))?;
    config
        .apply_store(&store)
        .with_context(|| format!("applying settings from {}", store_path.display()))?;
    config.validate()?;
    tracing::debug!("{} stored settings applied", store.keys().len());
    Ok(config)
}

/// Open the configured serial port
///
/// A port that cannot be opened leaves the channel unopened; the poller
/// reports it when the serial link is selected.
pub fn open_serial(settings: &SerialSettings) -> SerialChannel {
    let port = if settings.is_auto() {
        match list_ports() {
            Ok(ports) => match ports.into_iter().next() {
                Some(info) => {
                    tracing::info!("using serial port {} ({})", info.port_name, info.description);
                    info.port_name
                }
                None => {
                    tracing::warn!("no candidate serial port found");
                    return SerialChannel::unopened();
                }
            },
            Err(e) => {
                tracing::warn!("serial port discovery failed: {}", e);
                return SerialChannel::unopened();
            }
        }
    } else {
        settings.port.clone()
    };

    let params = SerialParams {
        port,
        baud_rate: settings.baud_rate,
        read_timeout: settings.read_timeout(),
    };
    match SerialChannel::open(&params) {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!("serial port {} unavailable: {}", params.port, e);
            SerialChannel::unopened()
        }
    }
}

/// Frame limits from the serial section
pub fn frame_config(settings: &SerialSettings) -> FrameConfig {
    FrameConfig {
        capacity: settings.frame_capacity,
        response_timeout: settings.response_timeout(),
        timeout_threshold: settings.timeout_threshold,
        ..FrameConfig::default()
    }
}

pub fn poller_config(config: &Config) -> PollerConfig {
    PollerConfig {
        password: config.controller.password.clone(),
        ticks_per_poll: config.polling.ticks_per_poll,
        wifi_fallback: config.polling.wifi_fallback(),
        ..PollerConfig::default()
    }
}

/// Build a poller with real transports
///
/// The reqwest blocking client owns a runtime of its own, so this must be
/// called outside any async context.
pub fn build_poller(config: &Config) -> anyhow::Result<Poller> {
    let controller = &config.controller;
    let mut http = HttpChannel::new(controller.response_capacity, controller.http_timeout());
    if controller.address.trim().is_empty() {
        tracing::warn!("no controller address configured, WiFi polling disabled");
    } else {
        http.connect(&controller.address, Box::new(ReqwestBackend::new()?));
    }

    let serial = open_serial(&config.serial);
    Ok(Poller::new(
        poller_config(config),
        shared_snapshot(),
        http,
        Box::new(serial),
        LineFrameAssembler::new(frame_config(&config.serial)),
    ))
}

/// Turns reachability samples into connectivity events
///
/// Stands in for a WiFi provider on hosts where the network is managed
/// elsewhere: a reachable controller counts as an associated link with an
/// address, an unreachable one as a failed or dropped link.
#[derive(Debug)]
pub struct ReachabilityProbe {
    address: String,
    reachable: Option<bool>,
}

impl ReachabilityProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reachable: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Events implied by a new sample; empty when nothing changed
    pub fn observe(&mut self, reachable: bool) -> Vec<ConnectivityEvent> {
        let previous = self.reachable.replace(reachable);
        match (previous, reachable) {
            (None, true) => vec![
                ConnectivityEvent::Connecting,
                ConnectivityEvent::LinkUp,
                ConnectivityEvent::IpAcquired(self.address.clone()),
            ],
            (None, false) => vec![
                ConnectivityEvent::Connecting,
                ConnectivityEvent::AssociationFailed,
            ],
            (Some(false), true) => vec![
                ConnectivityEvent::LinkUp,
                ConnectivityEvent::IpAcquired(self.address.clone()),
            ],
            (Some(true), false) => vec![ConnectivityEvent::LinkDown],
            _ => Vec::new(),
        }
    }
}

/// Try a TCP connection to the controller's HTTP port
pub fn is_reachable(address: &str, timeout: Duration) -> bool {
    match resolve(address) {
        Some(addr) => TcpStream::connect_timeout(&addr, timeout).is_ok(),
        None => {
            tracing::debug!("cannot resolve {}", address);
            false
        }
    }
}

/// First socket address for a configured controller address
fn resolve(address: &str) -> Option<SocketAddr> {
    let host = address
        .trim()
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split('/')
        .next()?;
    if host.is_empty() {
        return None;
    }
    let target = if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, HTTP_PORT)
    };
    target.to_socket_addrs().ok()?.next()
}

fn temperature(current: Option<f32>, target: Option<f32>) -> String {
    let current = current.map_or_else(|| "--".to_string(), |t| format!("{:.1}", t));
    match target {
        Some(t) if t > 0.0 => format!("{}/{:.0}", current, t),
        _ => current,
    }
}

fn duration(secs: f32) -> String {
    let secs = secs.max(0.0) as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else {
        format!("{}m{:02}s", m, s)
    }
}

/// One-line rendering of the snapshot
pub fn status_line(snapshot: &MachineSnapshot, link: LinkState) -> String {
    let mut line = format!("[{}] {}", link, snapshot.status);

    let _ = write!(
        line,
        " | bed {}",
        temperature(snapshot.bed.current(), snapshot.bed.active)
    );
    for tool in snapshot.tools.iter() {
        let marker = if snapshot.current_tool == Some(tool.number) {
            "*"
        } else {
            ""
        };
        let _ = write!(
            line,
            " | {}{} {}",
            marker,
            tool.name,
            temperature(tool.current(), tool.active)
        );
    }

    if snapshot.job_running() {
        let job = &snapshot.job;
        if let Some(percent) = job.percent {
            let _ = write!(line, " | {:.1}%", percent);
        }
        match (job.layer, job.total_layers) {
            (Some(layer), Some(total)) => {
                let _ = write!(line, " layer {}/{}", layer, total);
            }
            (Some(layer), None) => {
                let _ = write!(line, " layer {}", layer);
            }
            _ => {}
        }
        if let (Some(remaining), Some(source)) = (job.remaining, job.remaining_source) {
            let _ = write!(line, " | {} left ({})", duration(remaining), source);
        }
        if let Some(name) = &job.file_name {
            let _ = write!(line, " | {}", name);
        }
    }
    line
}
