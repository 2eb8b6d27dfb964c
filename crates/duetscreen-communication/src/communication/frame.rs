//! Frame assembly
//!
//! Two fixed-capacity buffers sit between the transports and the decoders:
//! - [`LineFrameAssembler`] turns the serial byte stream into newline
//!   terminated frames and tracks consecutive timeouts
//! - [`ResponseBuffer`] collects one HTTP body and refuses anything larger
//!   than its capacity

use super::ByteChannel;
use duetscreen_core::{Result, TransportError};
use std::time::{Duration, Instant};

/// Default serial frame capacity in bytes
pub const DEFAULT_FRAME_CAPACITY: usize = 2048;

/// Default time allowed for a complete serial frame
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Consecutive timeouts tolerated before the link counts as dead
pub const DEFAULT_TIMEOUT_THRESHOLD: u32 = 1;

/// Serial frame assembly settings
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub capacity: usize,
    pub response_timeout: Duration,
    pub timeout_threshold: u32,
    /// Upper bound on a single channel wait inside the assembly loop
    pub poll_wait: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_FRAME_CAPACITY,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            timeout_threshold: DEFAULT_TIMEOUT_THRESHOLD,
            poll_wait: Duration::from_millis(50),
        }
    }
}

/// Assembles newline-terminated frames from a byte channel
///
/// Bytes following a newline stay in the buffer and start the next frame.
/// The buffer never grows: a frame that fills it without a newline is an
/// overflow and the buffer is discarded.
#[derive(Debug)]
pub struct LineFrameAssembler {
    config: FrameConfig,
    buf: Vec<u8>,
    len: usize,
    consecutive_timeouts: u32,
}

impl LineFrameAssembler {
    pub fn new(config: FrameConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            config: FrameConfig { capacity, ..config },
            buf: vec![0; capacity],
            len: 0,
            consecutive_timeouts: 0,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Bytes carried over from the previous read
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    /// True once consecutive timeouts exceed the configured threshold
    pub fn link_dead(&self) -> bool {
        self.consecutive_timeouts > self.config.timeout_threshold
    }

    /// Forget buffered bytes and the timeout history
    pub fn reset(&mut self) {
        self.len = 0;
        self.consecutive_timeouts = 0;
    }

    /// Read one frame, without its line terminator
    ///
    /// Returns `ReadTimeout` when no newline arrives before the deadline and
    /// `BufferOverflow` when the buffer fills first. Channel errors are
    /// passed through unchanged.
    pub fn read_frame(&mut self, channel: &mut dyn ByteChannel) -> Result<String> {
        if let Some(frame) = self.take_frame(0) {
            return Ok(frame);
        }

        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            if self.len == self.config.capacity {
                let capacity = self.config.capacity;
                self.len = 0;
                tracing::warn!(
                    "{}: frame exceeded {} bytes without a terminator, discarded",
                    channel.name(),
                    capacity
                );
                return Err(TransportError::BufferOverflow { capacity }.into());
            }

            let now = Instant::now();
            if now >= deadline {
                self.len = 0;
                self.consecutive_timeouts = self.consecutive_timeouts.saturating_add(1);
                tracing::debug!(
                    "{}: no frame within {:?} ({} consecutive)",
                    channel.name(),
                    self.config.response_timeout,
                    self.consecutive_timeouts
                );
                return Err(TransportError::ReadTimeout {
                    timeout_ms: self.config.response_timeout.as_millis() as u64,
                }
                .into());
            }

            let wait = self.config.poll_wait.min(deadline - now);
            let start = self.len;
            let n = channel.read(&mut self.buf[start..], wait)?;
            self.len += n;

            if let Some(frame) = self.take_frame(start) {
                return Ok(frame);
            }
        }
    }

    /// Split off the first frame if a newline exists at or after `from`
    fn take_frame(&mut self, from: usize) -> Option<String> {
        let pos = self.buf[from..self.len].iter().position(|&b| b == b'\n')? + from;

        let mut end = pos;
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        let frame = String::from_utf8_lossy(&self.buf[..end]).into_owned();

        self.buf.copy_within(pos + 1..self.len, 0);
        self.len -= pos + 1;
        self.consecutive_timeouts = 0;
        Some(frame)
    }
}

impl Default for LineFrameAssembler {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

/// Fixed-capacity store for one HTTP response body
#[derive(Debug)]
pub struct ResponseBuffer {
    buf: Vec<u8>,
    len: usize,
    overflowed: bool,
}

impl ResponseBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            len: 0,
            overflowed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Append a chunk. A chunk that does not fit discards everything
    /// collected so far and marks the buffer overflowed.
    pub fn append(&mut self, chunk: &[u8]) -> bool {
        if self.overflowed {
            return false;
        }
        if chunk.len() > self.capacity() - self.len {
            tracing::warn!(
                "response larger than {} bytes, discarded",
                self.capacity()
            );
            self.len = 0;
            self.overflowed = true;
            return false;
        }
        self.buf[self.len..self.len + chunk.len()].copy_from_slice(chunk);
        self.len += chunk.len();
        true
    }

    pub fn body(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Copy up to `out.len()` bytes starting at `offset`
    pub fn copy_from(&self, offset: usize, out: &mut [u8]) -> usize {
        let available = self.len.saturating_sub(offset);
        let n = available.min(out.len());
        if n == 0 {
            return 0;
        }
        out[..n].copy_from_slice(&self.buf[offset..offset + n]);
        n
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Feed {
        bytes: VecDeque<u8>,
    }

    impl Feed {
        fn new(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.iter().copied().collect(),
            }
        }
    }

    impl ByteChannel for Feed {
        fn send(&mut self, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }

        fn bytes_available(&mut self) -> Result<usize> {
            Ok(self.bytes.len())
        }

        fn read(&mut self, buf: &mut [u8], _wait: Duration) -> Result<usize> {
            let n = buf.len().min(self.bytes.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.bytes.pop_front().unwrap();
            }
            Ok(n)
        }

        fn name(&self) -> String {
            "feed".into()
        }
    }

    fn assembler(capacity: usize) -> LineFrameAssembler {
        LineFrameAssembler::new(FrameConfig {
            capacity,
            response_timeout: Duration::from_millis(20),
            timeout_threshold: 1,
            poll_wait: Duration::from_millis(1),
        })
    }

    #[test]
    fn test_single_frame() {
        let mut feed = Feed::new(b"state\n");
        assert_eq!(assembler(64).read_frame(&mut feed).unwrap(), "state");
    }

    #[test]
    fn test_crlf_stripped_and_leftover_kept() {
        let mut feed = Feed::new(b"one\r\ntwo\n");
        let mut asm = assembler(64);
        assert_eq!(asm.read_frame(&mut feed).unwrap(), "one");
        assert_eq!(asm.read_frame(&mut feed).unwrap(), "two");
        assert!(asm.pending().is_empty());
    }

    #[test]
    fn test_overflow_without_terminator() {
        let mut feed = Feed::new(&[b'a'; 25]);
        let mut asm = assembler(20);
        let err = asm.read_frame(&mut feed).unwrap_err();
        assert!(matches!(
            err,
            duetscreen_core::Error::Transport(TransportError::BufferOverflow { capacity: 20 })
        ));
        assert_eq!(feed.bytes.len(), 5);
        assert!(asm.pending().is_empty());
    }

    #[test]
    fn test_timeouts_mark_link_dead() {
        let mut feed = Feed::new(b"");
        let mut asm = assembler(16);
        assert!(asm.read_frame(&mut feed).unwrap_err().is_timeout());
        assert!(!asm.link_dead());
        assert!(asm.read_frame(&mut feed).unwrap_err().is_timeout());
        assert!(asm.link_dead());

        feed.bytes.extend(b"ok\n");
        assert_eq!(asm.read_frame(&mut feed).unwrap(), "ok");
        assert_eq!(asm.consecutive_timeouts(), 0);
    }

    #[test]
    fn test_response_buffer_overflow_resets() {
        let mut buffer = ResponseBuffer::new(8);
        assert!(buffer.append(b"abcd"));
        assert!(!buffer.append(b"efghij"));
        assert!(buffer.overflowed());
        assert!(buffer.is_empty());
        buffer.reset();
        assert!(buffer.append(b"12345678"));
        assert_eq!(buffer.body(), b"12345678");
    }

    #[test]
    fn test_response_buffer_copy_from() {
        let mut buffer = ResponseBuffer::new(16);
        buffer.append(b"hello");
        let mut out = [0u8; 3];
        assert_eq!(buffer.copy_from(3, &mut out), 2);
        assert_eq!(&out[..2], b"lo");
        assert_eq!(buffer.copy_from(9, &mut out), 0);
    }
}
