//! Classify HTTP statuses and transport errors into retry error kinds.

use std::collections::BTreeSet;

use crate::location::StorageLocation;
use crate::transport::{TransportError, TransportErrorKind};

use super::policy::ErrorKind;

/// Classify an HTTP status against a set of retryable statuses.
pub fn classify_http_status(status: u16, retryable: &BTreeSet<u16>) -> ErrorKind {
    if !retryable.contains(&status) {
        return ErrorKind::NonRetryable;
    }
    match status {
        429 | 503 => ErrorKind::Throttled(status),
        500..=599 => ErrorKind::ServerError(status),
        _ => ErrorKind::RetryableStatus(status),
    }
}

/// Like [`classify_http_status`], but a 404 served by the secondary endpoint
/// is treated as replication lag rather than a missing resource.
pub fn classify_status_at(
    status: u16,
    location: StorageLocation,
    retryable: &BTreeSet<u16>,
) -> ErrorKind {
    if status == 404 && location == StorageLocation::Secondary {
        return ErrorKind::SecondaryNotFound;
    }
    classify_http_status(status, retryable)
}

/// Classify a transport failure.
pub fn classify_transport_error(e: &TransportError) -> ErrorKind {
    match e.kind {
        TransportErrorKind::Timeout => ErrorKind::Timeout,
        TransportErrorKind::Connection => ErrorKind::Connection,
        TransportErrorKind::InvalidRequest
        | TransportErrorKind::Aborted
        | TransportErrorKind::Io
        | TransportErrorKind::Other => ErrorKind::NonRetryable,
    }
}
