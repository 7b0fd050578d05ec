//! Error taxonomy for the execution core.
//!
//! The engine recovers locally from `TransientNetwork` and `RetryableService`
//! by retrying; every other variant propagates to the caller unchanged.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::lro::JobFailure;
use crate::transport::{HttpResponse, TransportError};

/// Result alias used across the core.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Maximum number of body bytes kept in a `ServiceError` message when the
/// service did not send a structured error payload.
const MAX_RAW_MESSAGE: usize = 512;

/// Error reported by the service in a non-success response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code.
    pub status: u16,
    /// Service error code (`x-ms-error-code` header or `error.code` in the body).
    pub code: Option<String>,
    /// Human-readable message from the service, possibly empty.
    pub message: String,
    /// Server-assigned request id, useful when reporting failures.
    pub request_id: Option<String>,
}

impl ServiceError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build from a raw response without consuming it. Understands
    /// `{"error": {"code": .., "message": ..}}`, a flat `{"code", "message"}`
    /// object, and falls back to the (truncated) body text.
    pub fn from_response(response: &HttpResponse) -> Self {
        let mut code = response.header("x-ms-error-code").map(str::to_string);
        let mut message = String::new();

        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body) {
            let detail = value.get("error").unwrap_or(&value);
            if code.is_none() {
                code = detail
                    .get("code")
                    .and_then(|c| c.as_str())
                    .map(str::to_string);
            }
            if let Some(m) = detail.get("message").and_then(|m| m.as_str()) {
                message = m.to_string();
            }
        }
        if message.is_empty() && !response.body.is_empty() {
            let text = String::from_utf8_lossy(&response.body);
            message = text.chars().take(MAX_RAW_MESSAGE).collect::<String>().trim().to_string();
        }

        Self {
            status: response.status,
            code,
            message,
            request_id: response.header("x-ms-request-id").map(str::to_string),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " ({})", code)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Errors surfaced by the engine, the segmented iterator and the poller.
#[derive(Debug, Error)]
pub enum Error {
    /// Network-level failure that may succeed on another attempt.
    #[error("transient network error: {0}")]
    TransientNetwork(TransportError),

    /// Service status listed as retryable (408, 429, 5xx, per-operation extras).
    #[error("retryable service error: {0}")]
    RetryableService(ServiceError),

    /// Client error, auth failure or any status that is not retryable.
    #[error("service error: {0}")]
    FatalService(ServiceError),

    /// Transport failure that retrying cannot fix.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The request could not be built (bad URI, bad header, etc.).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The retry policy gave up; wraps the last retryable error.
    #[error("retries exhausted after {attempts} attempt(s) in {elapsed:?}: {last}")]
    RetryExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: Box<Error>,
    },

    /// A retry was due but the request body stream could not be rewound.
    #[error("request body cannot be rewound for a retry: {0}")]
    NonRestartableBody(#[source] std::io::Error),

    /// An operation was invoked in a state where it is not valid.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation is not supported (e.g. cancelling a backup job).
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A long-running job reported failure on the server side.
    #[error("job failed: {0}")]
    JobFailed(JobFailure),

    /// Cancelled through `OperationControl`.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller-supplied deadline passed before the operation finished.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// A success response could not be decoded into the expected value.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// Engine or endpoint configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Service error payload, looking through `RetryExhausted`.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self.root() {
            Error::RetryableService(e) | Error::FatalService(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP status of the underlying service error, if any.
    pub fn status(&self) -> Option<u16> {
        self.service_error().map(|e| e.status)
    }

    /// The last concrete error, unwrapping retry exhaustion.
    pub fn root(&self) -> &Error {
        match self {
            Error::RetryExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Number of attempts reported by a retry exhaustion error.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}
