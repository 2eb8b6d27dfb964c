//! HTTP transport to the controller's web server
//!
//! Every request is a GET relative to the controller's base URL. The body is
//! collected into a fixed [`ResponseBuffer`]; the buffer is reset when the
//! [`HttpResponse`] borrowing it is dropped and on every error path, so the
//! next request always starts from an empty buffer.

use super::frame::ResponseBuffer;
use super::ByteChannel;
use duetscreen_core::{Error, ProtocolError, Result, TransportError};
use std::borrow::Cow;
use std::io::Read;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(150);

/// Default response body capacity in bytes
pub const DEFAULT_RESPONSE_CAPACITY: usize = 16 * 1024;

/// Performs a single GET and streams the body to `sink`
///
/// `sink` returns false to stop reading early. The returned value is the
/// HTTP status code.
pub trait HttpBackend: Send {
    fn get(
        &mut self,
        url: &str,
        timeout: Duration,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<u16>;
}

/// Blocking reqwest client
pub struct ReqwestBackend {
    client: reqwest::blocking::Client,
}

impl ReqwestBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| http_error(&e))?;
        Ok(Self { client })
    }
}

fn http_error(e: &reqwest::Error) -> TransportError {
    TransportError::Http {
        reason: e.to_string(),
    }
}

impl HttpBackend for ReqwestBackend {
    fn get(
        &mut self,
        url: &str,
        timeout: Duration,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<u16> {
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::ReadTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }
                } else {
                    http_error(&e)
                }
            })?;

        let status = response.status().as_u16();
        let mut chunk = [0u8; 512];
        loop {
            let n = response.read(&mut chunk).map_err(|e| TransportError::Http {
                reason: e.to_string(),
            })?;
            if n == 0 || !sink(&chunk[..n]) {
                break;
            }
        }
        Ok(status)
    }
}

/// Resets the response buffer when dropped unless disarmed
#[derive(Debug)]
struct BufferGuard<'a> {
    buffer: &'a mut ResponseBuffer,
    armed: bool,
}

impl<'a> BufferGuard<'a> {
    fn new(buffer: &'a mut ResponseBuffer) -> Self {
        Self {
            buffer,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BufferGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.buffer.reset();
        }
    }
}

/// A successful response whose body lives in the channel's buffer
#[derive(Debug)]
pub struct HttpResponse<'a> {
    status: u16,
    guard: BufferGuard<'a>,
}

impl HttpResponse<'_> {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        self.guard.buffer.body()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body())
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(self.body()).map_err(|e| {
            ProtocolError::MalformedJson {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// HTTP link to a controller
pub struct HttpChannel {
    backend: Option<Box<dyn HttpBackend>>,
    base_url: Option<String>,
    timeout: Duration,
    buffer: ResponseBuffer,
    read_pos: usize,
    last_status: Option<u16>,
}

impl HttpChannel {
    /// Channel with no controller attached
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self {
            backend: None,
            base_url: None,
            timeout,
            buffer: ResponseBuffer::new(capacity),
            read_pos: 0,
            last_status: None,
        }
    }

    /// Attach a controller address and the backend used to reach it
    ///
    /// A bare host such as `192.168.1.20` gets an `http://` scheme.
    pub fn connect(&mut self, address: &str, backend: Box<dyn HttpBackend>) {
        let address = address.trim().trim_end_matches('/');
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        tracing::info!("HTTP channel targeting {}", base);
        self.base_url = Some(base);
        self.backend = Some(backend);
        self.buffer.reset();
        self.read_pos = 0;
    }

    pub fn disconnect(&mut self) {
        self.backend = None;
        self.base_url = None;
        self.buffer.reset();
        self.read_pos = 0;
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_some() && self.base_url.is_some()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Status code of the last completed exchange
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Bytes currently held in the response buffer
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Perform a GET and leave the body in the buffer
    fn fetch(&mut self, path: &str) -> Result<u16> {
        let Self {
            backend,
            base_url,
            timeout,
            buffer,
            read_pos,
            last_status,
        } = self;

        let (backend, base) = match (backend.as_mut(), base_url.as_deref()) {
            (Some(backend), Some(base)) => (backend, base),
            _ => {
                return Err(TransportError::NotInitialized {
                    link: "http".to_string(),
                }
                .into())
            }
        };

        *read_pos = 0;
        *last_status = None;
        buffer.reset();
        let capacity = buffer.capacity();
        let url = format!("{}{}", base, path);
        tracing::trace!("GET {}", redact(path));

        let mut guard = BufferGuard::new(buffer);
        let status = backend.get(&url, *timeout, &mut |chunk: &[u8]| {
            guard.buffer.append(chunk)
        })?;
        if guard.buffer.overflowed() {
            return Err(TransportError::BufferOverflow { capacity }.into());
        }

        *last_status = Some(status);
        guard.disarm();
        Ok(status)
    }

    /// GET `path` and return the response
    ///
    /// A 401 maps to `AuthRequired` and any other non-2xx status to
    /// `UnexpectedStatus`; neither leaves data in the buffer.
    pub fn request(&mut self, path: &str) -> Result<HttpResponse<'_>> {
        let status = self.fetch(path)?;
        let guard = BufferGuard::new(&mut self.buffer);
        check_status(status, path)?;
        Ok(HttpResponse { status, guard })
    }
}

impl Default for HttpChannel {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_CAPACITY, DEFAULT_HTTP_TIMEOUT)
    }
}

fn check_status(status: u16, path: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        401 => Err(ProtocolError::AuthRequired {
            path: redact(path).to_string(),
        }
        .into()),
        _ => Err(ProtocolError::UnexpectedStatus {
            status,
            path: redact(path).to_string(),
        }
        .into()),
    }
}

/// Drop the query string so passwords never reach the log
fn redact(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

impl ByteChannel for HttpChannel {
    /// Treats `data` as a request path; the body becomes readable afterwards
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let path = std::str::from_utf8(data)
            .map_err(|e| Error::other(format!("request path is not UTF-8: {}", e)))?;
        let status = self.fetch(path)?;
        if let Err(e) = check_status(status, path) {
            self.buffer.reset();
            return Err(e);
        }
        Ok(data.len())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        if !self.is_connected() {
            return Err(TransportError::NotInitialized {
                link: "http".to_string(),
            }
            .into());
        }
        Ok(self.buffer.len().saturating_sub(self.read_pos))
    }

    /// The body is complete once `send` returns, so `wait` is not used
    fn read(&mut self, buf: &mut [u8], _wait: Duration) -> Result<usize> {
        if !self.is_connected() {
            return Err(TransportError::NotInitialized {
                link: "http".to_string(),
            }
            .into());
        }
        let n = self.buffer.copy_from(self.read_pos, buf);
        self.read_pos += n;
        if self.read_pos >= self.buffer.len() {
            self.buffer.reset();
            self.read_pos = 0;
        }
        Ok(n)
    }

    fn name(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| "http (unconfigured)".to_string())
    }
}
