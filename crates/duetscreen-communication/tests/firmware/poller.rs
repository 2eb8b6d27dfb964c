//! Tests for firmware::duet::poller

use crate::support::{self, LoopbackPort, ScriptedBackend, BASE};
use duetscreen_communication::communication::{
    FrameConfig, HttpChannel, LineFrameAssembler, SerialChannel,
};
use duetscreen_communication::firmware::duet::{
    DispatchOutcome, LinkState, Poller, PollerConfig, TickOutcome,
};
use duetscreen_core::{
    shared_snapshot, ConnectivityDispatcher, ConnectivityEvent, ListingKind, MachineStatus,
};
use std::time::{Duration, Instant};

fn wifi_poller(backend: &ScriptedBackend) -> Poller {
    let mut http = HttpChannel::default();
    http.connect(BASE, Box::new(backend.clone()));
    let mut poller = Poller::new(
        PollerConfig {
            password: "reprap".to_string(),
            ..PollerConfig::default()
        },
        shared_snapshot(),
        http,
        Box::new(SerialChannel::unopened()),
        LineFrameAssembler::default(),
    );
    poller.handle_event(
        &ConnectivityEvent::IpAcquired("192.168.1.40".into()),
        Instant::now(),
    );
    poller
}

fn serial_poller(port: &LoopbackPort, response_timeout: Duration) -> Poller {
    let frames = LineFrameAssembler::new(FrameConfig {
        capacity: 1024,
        response_timeout,
        timeout_threshold: 1,
        poll_wait: Duration::from_millis(1),
    });
    let mut poller = Poller::new(
        PollerConfig::default(),
        shared_snapshot(),
        HttpChannel::default(),
        Box::new(SerialChannel::new(Box::new(port.clone()))),
        frames,
    );
    poller.handle_event(&ConnectivityEvent::AssociationFailed, Instant::now());
    poller
}

#[test]
fn test_first_wifi_tick_order() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);

    assert!(matches!(poller.tick(), TickOutcome::Polled));
    assert_eq!(
        backend.requests(),
        vec![
            "/rr_config",
            "/rr_filelist?dir=0%3A%2Ffilaments",
            "/rr_status?type=2",
            "/rr_status?type=1",
        ]
    );

    let snapshot = poller.snapshot();
    let snapshot = snapshot.read();
    assert_eq!(snapshot.status, MachineStatus::Idle);
    assert_eq!(snapshot.tools.len(), 1);
    assert_eq!(snapshot.listings.filaments.entries.len(), 2);
    assert_eq!(snapshot.axes.get(0).unwrap().max, Some(230.0));
}

#[test]
fn test_steady_state_polls_lightweight_status() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    poller.tick();
    backend.clear_log();

    poller.tick();
    poller.tick();
    assert_eq!(
        backend.requests(),
        vec!["/rr_status?type=1", "/rr_status?type=1"]
    );
}

#[test]
fn test_file_info_once_per_job_start() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    poller.tick();

    backend.replace("/rr_status?type=1", 200, support::PRINTING);
    poller.tick();
    assert_eq!(backend.count("/rr_fileinfo"), 1);

    poller.tick();
    poller.tick();
    assert_eq!(backend.count("/rr_fileinfo"), 1);
    assert_eq!(backend.count("/rr_status?type=3"), 2);

    let snapshot = poller.snapshot();
    let snapshot = snapshot.read();
    assert_eq!(snapshot.job.file_name.as_deref(), Some("benchy.gcode"));
    assert_eq!(snapshot.job.total_layers, Some(240));
    assert_eq!(snapshot.job.percent, Some(12.5));
}

#[test]
fn test_job_restart_fetches_file_info_again() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    backend.replace("/rr_status?type=1", 200, support::PRINTING);
    poller.tick();
    assert_eq!(backend.count("/rr_fileinfo"), 1);

    backend.replace("/rr_status?type=3", 200, support::IDLE);
    backend.replace("/rr_status?type=1", 200, support::IDLE);
    poller.tick();
    poller.tick();

    backend.replace("/rr_status?type=1", 200, support::PRINTING);
    poller.tick();
    assert_eq!(backend.count("/rr_fileinfo"), 2);
}

#[test]
fn test_unauthorized_triggers_connect() {
    let backend = support::idle_controller();
    backend.replace("/rr_config", 401, "");
    let mut poller = wifi_poller(&backend);

    assert!(matches!(poller.tick(), TickOutcome::Reauthenticated));
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].starts_with("/rr_connect?password=reprap&time="));

    backend.replace("/rr_config", 200, support::CONFIG);
    assert!(matches!(poller.tick(), TickOutcome::Polled));
    assert_eq!(
        poller.snapshot().read().firmware.board.as_deref(),
        Some("Duet WiFi 1.02 or later")
    );
}

#[test]
fn test_error_abandons_rest_of_tick() {
    let backend = support::idle_controller();
    backend.replace("/rr_status?type=2", 500, "");
    let mut poller = wifi_poller(&backend);

    assert!(matches!(poller.tick(), TickOutcome::Failed(_)));
    assert_eq!(backend.count("/rr_status?type=1"), 0);

    backend.clear_log();
    backend.replace("/rr_status?type=2", 200, support::EXTENDED);
    poller.tick();
    assert_eq!(
        backend.requests(),
        vec!["/rr_status?type=2", "/rr_status?type=1"]
    );
}

#[test]
fn test_malformed_status_leaves_snapshot() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    poller.tick();
    let before = poller.snapshot().read().clone();

    backend.replace("/rr_status?type=1", 200, r#"{"status":"P","temps":"#);
    assert!(matches!(poller.tick(), TickOutcome::Failed(_)));
    assert_eq!(*poller.snapshot().read(), before);
}

#[test]
fn test_reply_fetched_when_sequence_moves() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    poller.tick();
    assert_eq!(backend.count("/rr_reply"), 0);

    backend.replace(
        "/rr_status?type=1",
        200,
        r#"{"status":"I","seq":2}"#,
    );
    backend.replace("/rr_reply", 200, "Error: G0/G1: insufficient axes homed\n");
    poller.tick();
    poller.tick();

    assert_eq!(backend.count("/rr_reply"), 1);
    let snapshot = poller.snapshot();
    let snapshot = snapshot.read();
    assert_eq!(snapshot.seqs.last_reply, "Error: G0/G1: insufficient axes homed");
    assert!(!snapshot.seqs.reply_pending);
}

#[test]
fn test_extended_refresh_request() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    poller.tick();
    let refresh = poller.extended_refresh();

    refresh.request();
    backend.clear_log();
    poller.tick();
    assert_eq!(
        backend.requests(),
        vec!["/rr_status?type=2", "/rr_status?type=1"]
    );
}

#[test]
fn test_queued_listing_served_last() {
    let backend = support::idle_controller();
    backend.respond(
        "/rr_filelist?dir=0%3A%2Fmacros",
        200,
        r#"{"dir":"0:/macros","files":[{"type":"f","name":"Level bed"}]}"#,
    );
    let mut poller = wifi_poller(&backend);
    poller.tick();

    poller.request_listing(ListingKind::Macros, None);
    backend.clear_log();
    poller.tick();
    assert_eq!(
        backend.requests(),
        vec!["/rr_status?type=1", "/rr_filelist?dir=0%3A%2Fmacros"]
    );
    assert_eq!(poller.snapshot().read().listings.macros.entries.len(), 1);

    backend.clear_log();
    poller.tick();
    assert_eq!(backend.requests(), vec!["/rr_status?type=1"]);
}

#[test]
fn test_submit_command_per_link() {
    let backend = support::idle_controller();
    let mut poller = wifi_poller(&backend);
    assert_eq!(
        poller.submit_command("G28 X").unwrap(),
        DispatchOutcome::Sent
    );
    assert_eq!(backend.requests(), vec!["/rr_gcode?gcode=G28+X"]);
    assert_eq!(poller.dispatcher().buffer_space(), Some(240));

    poller.handle_event(&ConnectivityEvent::AssociationFailed, Instant::now());
    assert_eq!(
        poller.submit_command("G28 X").unwrap(),
        DispatchOutcome::Unsupported
    );
    assert_eq!(backend.count("/rr_gcode"), 1);
}

#[test]
fn test_serial_poll_decodes_object_model() {
    let port = LoopbackPort::new();
    port.reply(
        b"{\"key\":\"\",\"flags\":\"d99fn\",\"result\":{\"state\":{\"status\":\"processing\"},\
\"heat\":{\"bedHeaters\":[0],\"heaters\":[{\"current\":58.5,\"state\":\"active\"}]}}}\n",
    );
    let mut poller = serial_poller(&port, Duration::from_millis(50));

    assert!(matches!(poller.tick(), TickOutcome::Polled));
    assert_eq!(port.written(), "M409 F\"d99fn\"\r\n");

    let snapshot = poller.snapshot();
    let snapshot = snapshot.read();
    assert_eq!(snapshot.status, MachineStatus::Printing);
    assert_eq!(snapshot.bed.current(), Some(58.5));
}

#[test]
fn test_truncated_serial_query_counted() {
    let port = LoopbackPort::new();
    port.limit_writes(4);
    let mut poller = serial_poller(&port, Duration::from_millis(5));

    assert!(matches!(poller.tick(), TickOutcome::Failed(_)));
    assert_eq!(port.written(), "M409");
    assert_eq!(poller.truncated_queries(), 1);
}

#[test]
fn test_download_renews_expired_session() {
    let backend = support::idle_controller();
    backend
        .respond("/rr_download", 401, "")
        .respond("/rr_download", 200, "M104 S210\n");
    let mut poller = wifi_poller(&backend);

    let text = poller.download("0:/filaments/PLA/config.g").unwrap();
    assert_eq!(text, "M104 S210\n");
    let requests = backend.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].starts_with("/rr_download?name=0%3A%2Ffilaments"));
    assert!(requests[1].starts_with("/rr_connect?password=reprap"));
    assert_eq!(requests[2], requests[0]);
}

#[test]
fn test_download_gives_up_when_connect_fails() {
    let backend = support::idle_controller();
    backend.respond("/rr_download", 401, "");
    backend.replace("/rr_connect", 200, r#"{"err":1}"#);
    let mut poller = wifi_poller(&backend);

    let err = poller.download("0:/sys/config.g").unwrap_err();
    assert!(err.is_auth_required());
    assert_eq!(backend.count("/rr_download"), 1);
}

#[test]
fn test_serial_skips_non_json_lines() {
    let port = LoopbackPort::new();
    port.reply(b"ok\r\n{\"state\":{\"status\":\"idle\"}}\n");
    let mut poller = serial_poller(&port, Duration::from_millis(50));

    assert!(matches!(poller.tick(), TickOutcome::Polled));
    assert_eq!(poller.snapshot().read().status, MachineStatus::Idle);
}

#[test]
fn test_serial_timeouts_disconnect() {
    let port = LoopbackPort::new();
    let mut poller = serial_poller(&port, Duration::from_millis(5));

    match poller.tick() {
        TickOutcome::Failed(e) => assert!(e.is_timeout()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(poller.link(), LinkState::SerialConnected);

    assert!(matches!(poller.tick(), TickOutcome::Failed(_)));
    assert_eq!(poller.link(), LinkState::Disconnected);
    assert_eq!(poller.frames().consecutive_timeouts(), 0);
}

#[test]
fn test_events_from_dispatcher() {
    let backend = support::idle_controller();
    let mut http = HttpChannel::default();
    http.connect(BASE, Box::new(backend.clone()));
    let mut poller = Poller::new(
        PollerConfig::default(),
        shared_snapshot(),
        http,
        Box::new(SerialChannel::unopened()),
        LineFrameAssembler::default(),
    );
    let connectivity = ConnectivityDispatcher::default();
    poller.attach_events(connectivity.subscribe());

    connectivity.publish(ConnectivityEvent::Connecting);
    assert!(matches!(poller.tick(), TickOutcome::Idle));

    connectivity.publish(ConnectivityEvent::IpAcquired("192.168.1.40".into()));
    assert!(matches!(poller.tick(), TickOutcome::Polled));
    assert_eq!(poller.link(), LinkState::WifiConnected);
}
