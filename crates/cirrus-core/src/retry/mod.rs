//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures, retryable statuses) and exponential backoff
//! decisions. The engine is the only place that acts on a decision.

mod classify;
mod policy;

pub use classify::{classify_http_status, classify_status_at, classify_transport_error};
pub use policy::{
    ClassifiedError, ErrorKind, RetryDecision, RetryPolicy, StopReason,
    DEFAULT_RETRYABLE_STATUSES,
};
