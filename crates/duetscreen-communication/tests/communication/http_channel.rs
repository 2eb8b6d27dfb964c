//! Tests for the HTTP channel against a scripted controller

use crate::support::{ScriptedBackend, BASE};
use duetscreen_communication::communication::{ByteChannel, HttpChannel};
use duetscreen_core::{Error, ProtocolError, TransportError};
use std::time::Duration;

fn channel(backend: &ScriptedBackend, capacity: usize) -> HttpChannel {
    let mut http = HttpChannel::new(capacity, Duration::from_millis(150));
    http.connect(BASE, Box::new(backend.clone()));
    http
}

#[test]
fn test_request_returns_body() {
    let backend = ScriptedBackend::new();
    backend.respond("/rr_status?type=1", 200, r#"{"status":"I"}"#);
    let mut http = channel(&backend, 1024);

    let response = http.request("/rr_status?type=1").unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.json().unwrap()["status"], "I");
    drop(response);

    assert_eq!(http.last_status(), Some(200));
    assert_eq!(http.buffered_len(), 0);
}

#[test]
fn test_status_errors() {
    let backend = ScriptedBackend::new();
    backend
        .respond("/rr_config", 401, "")
        .respond("/rr_fileinfo", 404, "not found");
    let mut http = channel(&backend, 1024);

    let err = http.request("/rr_config").unwrap_err();
    assert!(err.is_auth_required());

    match http.request("/rr_fileinfo?name=0%3A%2Fgcodes%2Fx.g") {
        Err(Error::Protocol(ProtocolError::UnexpectedStatus { status, path })) => {
            assert_eq!(status, 404);
            assert_eq!(path, "/rr_fileinfo");
        }
        other => panic!("unexpected {:?}", other.map(|r| r.status())),
    }
    assert_eq!(http.buffered_len(), 0);
}

#[test]
fn test_oversized_body_rejected() {
    let backend = ScriptedBackend::new();
    let body = format!(r#"{{"files":"{}"}}"#, "a".repeat(300));
    backend.respond("/rr_filelist", 200, &body);
    let mut http = channel(&backend, 128);

    let err = http.request("/rr_filelist?dir=0%3A%2Fgcodes").unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::BufferOverflow { capacity: 128 })
    ));
    assert_eq!(http.buffered_len(), 0);
}

#[test]
fn test_byte_channel_reads_drain_body() {
    let backend = ScriptedBackend::new();
    backend.respond("/rr_reply", 200, "ok\nok\n");
    let mut http = channel(&backend, 1024);

    assert_eq!(http.send(b"/rr_reply").unwrap(), 9);
    assert_eq!(http.bytes_available().unwrap(), 6);

    let mut buf = [0u8; 4];
    assert_eq!(http.read(&mut buf, Duration::ZERO).unwrap(), 4);
    assert_eq!(&buf, b"ok\no");
    assert_eq!(http.read(&mut buf, Duration::ZERO).unwrap(), 2);
    assert_eq!(&buf[..2], b"k\n");
    assert_eq!(http.read(&mut buf, Duration::ZERO).unwrap(), 0);
}

#[test]
fn test_disconnected_channel() {
    let backend = ScriptedBackend::new();
    let mut http = channel(&backend, 1024);
    http.disconnect();

    assert!(http.request("/rr_reply").unwrap_err().is_not_initialized());
    assert!(backend.requests().is_empty());
}
