//! Transport collaborator.
//!
//! The engine is the only caller of [`Transport::send`]; everything above it
//! (pagination, polling) goes through the engine. Two implementations ship
//! with the crate: [`CurlTransport`] for real endpoints and
//! [`ScriptedTransport`] as an in-memory fake.

mod body;
mod error;
mod headers;
mod libcurl;
mod scripted;

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

pub use body::{OneShot, RequestBody, ResettableStream, Seekable};
pub use error::{TransportError, TransportErrorKind};
pub use headers::Headers;
pub use libcurl::{CurlOptions, CurlTransport};
pub use scripted::{RecordedRequest, ScriptedReply, ScriptedTransport};

/// HTTP method of a request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// True for methods that never change server state.
    pub fn is_safe(self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything about a request except its body. Built fresh for every attempt.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
}

impl RequestHead {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
        }
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Raw response handed to classifiers. The body is fully buffered so a
/// classifier can inspect it without consuming anything a retry needs.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Server back-off hint: `retry-after-ms` / `x-ms-retry-after-ms` in
    /// milliseconds, else `Retry-After` in whole seconds. HTTP-date values
    /// are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        for name in ["retry-after-ms", "x-ms-retry-after-ms"] {
            if let Some(ms) = self.header(name).and_then(|v| v.trim().parse::<u64>().ok()) {
                return Some(Duration::from_millis(ms));
            }
        }
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Sends one request attempt. Implementations must honour `timeout` for the
/// whole attempt and must stop work promptly when the returned future is
/// dropped (the engine drops it on cancellation or deadline).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RequestHead,
        body: &mut RequestBody,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_prefers_millisecond_headers() {
        let r = HttpResponse::new(503)
            .with_header("Retry-After", "7")
            .with_header("x-ms-retry-after-ms", "1500");
        assert_eq!(r.retry_after(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn retry_after_seconds() {
        let r = HttpResponse::new(429).with_header("Retry-After", " 3 ");
        assert_eq!(r.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn retry_after_ignores_http_dates() {
        let r = HttpResponse::new(503).with_header("Retry-After", "Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(r.retry_after(), None);
    }

    #[test]
    fn safe_methods() {
        assert!(Method::Get.is_safe());
        assert!(Method::Head.is_safe());
        assert!(!Method::Put.is_safe());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
