//! Transport failure type.

use std::fmt;

/// What kind of transport failure occurred; drives retry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect or transfer timed out.
    Timeout,
    /// Connection refused/reset, DNS failure, send/receive error.
    Connection,
    /// The request itself was malformed (bad URL, unsupported scheme).
    InvalidRequest,
    /// The transfer was aborted because the caller dropped the send.
    Aborted,
    /// Reading the request body failed.
    Io,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connection => "connection",
            TransportErrorKind::InvalidRequest => "invalid request",
            TransportErrorKind::Aborted => "aborted",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Failure reported by a [`Transport`](super::Transport) before any
/// HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }
}
