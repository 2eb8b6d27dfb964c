//! Tests for line framing over a serial channel

use crate::support::LoopbackPort;
use duetscreen_communication::communication::{
    ByteChannel, FrameConfig, LineFrameAssembler, SerialChannel,
};
use duetscreen_core::{Error, TransportError};
use std::time::Duration;

fn assembler(capacity: usize) -> LineFrameAssembler {
    LineFrameAssembler::new(FrameConfig {
        capacity,
        response_timeout: Duration::from_millis(20),
        timeout_threshold: 1,
        poll_wait: Duration::from_millis(1),
    })
}

#[test]
fn test_query_and_reply_round() {
    let port = LoopbackPort::new();
    port.reply(b"{\"status\":\"I\"}\r\n");
    let mut channel = SerialChannel::new(Box::new(port.clone()));
    let mut frames = assembler(256);

    assert_eq!(channel.send(b"M408 S0").unwrap(), 7);
    assert_eq!(port.written(), "M408 S0\r\n");
    assert_eq!(frames.read_frame(&mut channel).unwrap(), "{\"status\":\"I\"}");
}

#[test]
fn test_frames_split_across_reads() {
    let port = LoopbackPort::new();
    port.inject(b"first\nsec");
    let mut channel = SerialChannel::new(Box::new(port.clone()));
    let mut frames = assembler(256);

    assert_eq!(frames.read_frame(&mut channel).unwrap(), "first");
    assert_eq!(frames.pending(), b"sec");

    port.inject(b"ond\r\n");
    assert_eq!(frames.read_frame(&mut channel).unwrap(), "second");
    assert!(frames.pending().is_empty());
}

#[test]
fn test_overflow_leaves_remainder_on_port() {
    let port = LoopbackPort::new();
    port.inject(&[b'x'; 25]);
    let mut channel = SerialChannel::new(Box::new(port.clone()));
    let mut frames = assembler(20);

    let err = frames.read_frame(&mut channel).unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::BufferOverflow { capacity: 20 })
    ));
    assert_eq!(port.pending(), 5);
    assert!(frames.pending().is_empty());

    port.inject(b"\n");
    assert_eq!(frames.read_frame(&mut channel).unwrap(), "xxxxx");
}

#[test]
fn test_silence_counts_timeouts() {
    let port = LoopbackPort::new();
    let mut channel = SerialChannel::new(Box::new(port.clone()));
    let mut frames = assembler(64);

    assert!(frames.read_frame(&mut channel).unwrap_err().is_timeout());
    assert!(!frames.link_dead());
    assert!(frames.read_frame(&mut channel).unwrap_err().is_timeout());
    assert!(frames.link_dead());

    port.inject(b"ok\n");
    assert_eq!(frames.read_frame(&mut channel).unwrap(), "ok");
    assert_eq!(frames.consecutive_timeouts(), 0);
}

#[test]
fn test_unopened_channel() {
    let mut channel = SerialChannel::unopened();
    let mut frames = assembler(64);
    assert!(channel.send(b"M408 S0").unwrap_err().is_not_initialized());
    assert!(frames.read_frame(&mut channel).unwrap_err().is_not_initialized());
}
