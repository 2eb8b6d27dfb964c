//! Polling state machine
//!
//! The [`Poller`] owns both transports and is the only writer of the shared
//! snapshot. An external scheduler calls [`Poller::tick`]; each tick drains
//! connectivity events, applies link transitions and, when the countdown
//! allows, runs one poll cycle on the active link.
//!
//! A cycle stops at the first transport or protocol error. Nothing is
//! retried inside a tick; the next tick starts over from whatever is still
//! outstanding.

use super::api::{RemoteApi, DEFAULT_OBJECT_MODEL_FLAGS};
use super::dispatcher::{CommandDispatcher, DispatchOutcome};
use super::json;
use super::{config, connect, decode_status, directory, file_info};
use super::{ConnectInfo, DecodeOutcome, Dialect, StatusKind};
use crate::communication::{ByteChannel, HttpChannel, LineFrameAssembler};
use crate::firmware::link_watch::{LinkWatch, LinkWatchState, DEFAULT_FALLBACK_AFTER};
use duetscreen_core::{ConnectivityEvent, Error, ListingKind, Result, SharedSnapshot};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Frames skipped while waiting for the object-model reply on serial
const MAX_SERIAL_FRAMES: usize = 4;

/// Which link the poller is using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    WifiConnected,
    SerialConnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::WifiConnected => write!(f, "WiFi"),
            Self::SerialConnected => write!(f, "serial"),
        }
    }
}

/// Poller settings
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Controller password sent with `rr_connect`
    pub password: String,
    /// Ticks between poll cycles; 1 polls on every tick
    pub ticks_per_poll: u32,
    /// How long the WiFi link may stay down before falling back to serial
    pub wifi_fallback: Duration,
    /// Flags for the serial `M409` query
    pub object_model_flags: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            ticks_per_poll: 1,
            wifi_fallback: DEFAULT_FALLBACK_AFTER,
            object_model_flags: DEFAULT_OBJECT_MODEL_FLAGS.to_string(),
        }
    }
}

/// Shared flag asking the poller to fetch extended status again
///
/// Cloned into a low-frequency task so it never touches a transport.
#[derive(Debug, Clone, Default)]
pub struct ExtendedRefresh(Arc<AtomicBool>);

impl ExtendedRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Result of one tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Countdown still running
    Waiting,
    /// No link to poll
    Idle,
    /// Poll cycle completed
    Polled,
    /// Session expired; `rr_connect` was issued instead of finishing the cycle
    Reauthenticated,
    /// Poll cycle abandoned
    Failed(Error),
}

/// One-time fetches on the WiFi link
#[derive(Debug, Clone, Copy, Default)]
struct WifiProgress {
    config: bool,
    filaments: bool,
    extended: bool,
}

/// Link selection and poll cycles for one controller
pub struct Poller {
    config: PollerConfig,
    snapshot: SharedSnapshot,
    http: HttpChannel,
    serial: Box<dyn ByteChannel>,
    frames: LineFrameAssembler,
    dispatcher: CommandDispatcher,
    events: Option<broadcast::Receiver<ConnectivityEvent>>,
    link: LinkState,
    watch: LinkWatch,
    countdown: u32,
    progress: WifiProgress,
    was_running: bool,
    extended_refresh: ExtendedRefresh,
    pending_listings: VecDeque<String>,
    truncated_queries: u32,
}

impl Poller {
    pub fn new(
        config: PollerConfig,
        snapshot: SharedSnapshot,
        http: HttpChannel,
        serial: Box<dyn ByteChannel>,
        frames: LineFrameAssembler,
    ) -> Self {
        let watch = LinkWatch::new(config.wifi_fallback);
        Self {
            config,
            snapshot,
            http,
            serial,
            frames,
            dispatcher: CommandDispatcher::new(),
            events: None,
            link: LinkState::Disconnected,
            watch,
            countdown: 0,
            progress: WifiProgress::default(),
            was_running: false,
            extended_refresh: ExtendedRefresh::new(),
            pending_listings: VecDeque::new(),
            truncated_queries: 0,
        }
    }

    /// Receive connectivity events from the provider
    pub fn attach_events(&mut self, events: broadcast::Receiver<ConnectivityEvent>) {
        self.events = Some(events);
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    /// Handle for requesting an extended status refresh
    pub fn extended_refresh(&self) -> ExtendedRefresh {
        self.extended_refresh.clone()
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn frames(&self) -> &LineFrameAssembler {
        &self.frames
    }

    /// Serial queries the port accepted only part of
    pub fn truncated_queries(&self) -> u32 {
        self.truncated_queries
    }

    /// Queue a directory listing for the end of the next WiFi cycle
    ///
    /// `directory` must sit under one of the listing roots.
    pub fn request_listing(&mut self, kind: ListingKind, directory: Option<&str>) {
        let dir = directory.unwrap_or(kind.root_directory()).to_string();
        if ListingKind::from_directory(&dir) != Some(kind) {
            tracing::warn!("{} is not a {} directory, listing not queued", dir, kind);
            return;
        }
        if !self.pending_listings.contains(&dir) {
            self.pending_listings.push_back(dir);
        }
    }

    /// Send a G-code line over the active link
    ///
    /// An expired session triggers `rr_connect`; the command itself is not
    /// resent.
    pub fn submit_command(&mut self, command: &str) -> Result<DispatchOutcome> {
        let result = self.dispatcher.dispatch(self.link, &mut self.http, command);
        if let Err(e) = &result {
            if e.is_auth_required() {
                self.authenticate();
            } else {
                tracing::warn!("command '{}' failed: {}", command.trim(), e);
            }
        }
        result
    }

    /// Apply a connectivity event
    pub fn handle_event(&mut self, event: &ConnectivityEvent, now: Instant) {
        match event {
            ConnectivityEvent::Connecting => {}
            ConnectivityEvent::LinkUp => {
                self.watch.heartbeat();
                if self.link == LinkState::Disconnected {
                    self.set_link(LinkState::WifiConnected);
                }
            }
            ConnectivityEvent::IpAcquired(ip) => {
                tracing::info!("WiFi address {}", ip);
                self.watch.heartbeat();
                self.set_link(LinkState::WifiConnected);
            }
            ConnectivityEvent::AssociationFailed => {
                self.watch.heartbeat();
                self.set_link(LinkState::SerialConnected);
            }
            ConnectivityEvent::LinkDown => {
                if self.link == LinkState::WifiConnected {
                    self.watch.mark_lost(now);
                }
            }
        }
    }

    /// Run one scheduler tick
    pub fn tick(&mut self) -> TickOutcome {
        let now = Instant::now();
        self.drain_events(now);
        self.check_fallback(now);

        if self.countdown > 1 {
            self.countdown -= 1;
            return TickOutcome::Waiting;
        }
        self.countdown = self.config.ticks_per_poll.max(1);

        match self.link {
            LinkState::Disconnected => TickOutcome::Idle,
            LinkState::WifiConnected => match self.poll_wifi() {
                Ok(()) => TickOutcome::Polled,
                Err(e) if e.is_auth_required() => {
                    tracing::info!("controller session expired, reconnecting");
                    self.authenticate();
                    TickOutcome::Reauthenticated
                }
                Err(e) => {
                    tracing::warn!("WiFi poll abandoned: {}", e);
                    TickOutcome::Failed(e)
                }
            },
            LinkState::SerialConnected => match self.poll_serial() {
                Ok(()) => TickOutcome::Polled,
                Err(e) => {
                    self.serial_failed(&e);
                    TickOutcome::Failed(e)
                }
            },
        }
    }

    fn drain_events(&mut self, now: Instant) {
        let Some(events) = self.events.as_mut() else {
            return;
        };

        let mut received = Vec::new();
        let mut closed = false;
        loop {
            match events.try_recv() {
                Ok(event) => received.push(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!("missed {} connectivity events", missed);
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            tracing::debug!("connectivity provider gone");
            self.events = None;
        }

        for event in &received {
            self.handle_event(event, now);
        }
    }

    fn check_fallback(&mut self, now: Instant) {
        if self.link == LinkState::WifiConnected
            && self.watch.state(now) == LinkWatchState::Expired
        {
            tracing::warn!(
                "WiFi down for more than {:?}, falling back to serial",
                self.watch.fallback_after()
            );
            self.watch.heartbeat();
            self.set_link(LinkState::SerialConnected);
        }
    }

    fn set_link(&mut self, link: LinkState) {
        if self.link == link {
            return;
        }
        tracing::info!("link {} -> {}", self.link, link);
        self.link = link;
        self.countdown = 0;
        if link == LinkState::SerialConnected {
            self.frames.reset();
        }
    }

    fn poll_wifi(&mut self) -> Result<()> {
        if !self.progress.config {
            let payload = self.fetch_json(RemoteApi::config())?;
            config::decode(&payload, &mut self.snapshot.write())?;
            self.progress.config = true;
        }

        if !self.progress.filaments {
            self.fetch_listing(ListingKind::Filaments.root_directory())?;
            self.progress.filaments = true;
        }

        if self.extended_refresh.take() {
            self.progress.extended = false;
        }
        if !self.progress.extended {
            self.fetch_status(StatusKind::Extended)?;
            self.progress.extended = true;
        }

        let kind = if self.snapshot.read().job_running() {
            StatusKind::Job
        } else {
            StatusKind::Lightweight
        };
        let outcome = self.fetch_status(kind)?;

        let running = self.snapshot.read().job_running();
        if running && !self.was_running {
            tracing::debug!("job started, fetching file info");
            let payload = self.fetch_json(&RemoteApi::file_info(None))?;
            file_info::decode(&payload, &mut self.snapshot.write())?;
        }
        self.was_running = running;

        if outcome.reply_changed || self.snapshot.read().seqs.reply_pending {
            let reply = self.http.request(RemoteApi::reply())?.text().into_owned();
            self.snapshot.write().seqs.set_reply(&reply);
        }

        while let Some(dir) = self.pending_listings.front().cloned() {
            self.fetch_listing(&dir)?;
            self.pending_listings.pop_front();
        }
        Ok(())
    }

    fn poll_serial(&mut self) -> Result<()> {
        let query = RemoteApi::object_model_query(&self.config.object_model_flags);
        self.serial.send(query.as_bytes())?;
        if self.serial.take_write_warning().is_some() {
            self.truncated_queries += 1;
        }

        for _ in 0..MAX_SERIAL_FRAMES {
            let frame = self.frames.read_frame(self.serial.as_mut())?;
            let line = frame.trim();
            if !line.starts_with('{') {
                tracing::trace!("serial: skipping '{}'", line);
                continue;
            }
            let payload = json::parse(line)?;
            decode_status(
                Dialect::ObjectModel,
                &payload,
                &mut self.snapshot.write(),
                StatusKind::Lightweight,
            )?;
            return Ok(());
        }
        Err(Error::other("no object model reply on serial"))
    }

    fn serial_failed(&mut self, error: &Error) {
        if error.is_not_initialized() {
            tracing::error!("serial link unavailable: {}", error);
            self.set_link(LinkState::Disconnected);
        } else if self.frames.link_dead() {
            tracing::warn!(
                "serial link dead after {} timeouts",
                self.frames.consecutive_timeouts()
            );
            self.frames.reset();
            self.set_link(LinkState::Disconnected);
        } else {
            tracing::warn!("serial poll abandoned: {}", error);
        }
    }

    /// Issue `rr_connect`; failures are logged and left for the next cycle
    fn authenticate(&mut self) -> bool {
        match self.connect() {
            Ok(info) => {
                tracing::info!(
                    "controller session established (timeout {:?} ms)",
                    info.session_timeout_ms
                );
                true
            }
            Err(e) => {
                tracing::error!("rr_connect failed: {}", e);
                false
            }
        }
    }

    fn connect(&mut self) -> Result<ConnectInfo> {
        let path = RemoteApi::connect_now(&self.config.password);
        let payload = self.fetch_json(&path)?;
        let info = connect::decode(&payload)?;
        if let Some(board) = &info.board_type {
            self.snapshot
                .write()
                .firmware
                .board
                .get_or_insert_with(|| board.clone());
        }
        Ok(info)
    }

    fn fetch_json(&mut self, path: &str) -> Result<Value> {
        let response = self.http.request(path)?;
        response.json()
    }

    fn fetch_status(&mut self, kind: StatusKind) -> Result<DecodeOutcome> {
        let payload = self.fetch_json(&RemoteApi::status(kind))?;
        decode_status(
            Dialect::LegacyStatus,
            &payload,
            &mut self.snapshot.write(),
            kind,
        )
    }

    fn fetch_listing(&mut self, dir: &str) -> Result<()> {
        let payload = self.fetch_json(&RemoteApi::file_list(dir))?;
        directory::decode(&payload, dir, &mut self.snapshot.write())?;
        Ok(())
    }

    /// Fetch a file from the controller as text, e.g. a filament's config
    ///
    /// An expired session is renewed and the download retried once.
    pub fn download(&mut self, name: &str) -> Result<String> {
        if self.link != LinkState::WifiConnected {
            return Err(Error::other("file download needs the WiFi link"));
        }
        let path = RemoteApi::download(name);
        match self.fetch_text(&path) {
            Err(e) if e.is_auth_required() => {
                if !self.authenticate() {
                    return Err(e);
                }
                self.fetch_text(&path)
            }
            other => other,
        }
    }

    fn fetch_text(&mut self, path: &str) -> Result<String> {
        let response = self.http.request(path)?;
        Ok(response.text().into_owned())
    }
}
