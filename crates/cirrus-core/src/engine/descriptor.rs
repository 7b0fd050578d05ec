//! Operation descriptors: everything the engine needs to run one logical
//! operation, supplied by the typed caller.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::location::{AccessKind, LocationMode, StorageLocation};
use crate::retry::{classify_status_at, ClassifiedError, ErrorKind};
use crate::transport::{HttpResponse, RequestBody, RequestHead, TransportError};

/// Location and base URI an attempt is built against.
#[derive(Debug, Clone, Copy)]
pub struct RequestTarget<'a> {
    pub location: StorageLocation,
    pub base: &'a Url,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl RequestTarget<'_> {
    /// Resolve `path` against the base URI.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidRequest(format!("cannot resolve {:?}: {}", path, e)))
    }

    /// Resolve `path` and append query pairs.
    pub fn url_with_query<'q, I>(&self, path: &str, pairs: I) -> Result<Url>
    where
        I: IntoIterator<Item = (&'q str, &'q str)>,
    {
        let mut url = self.url(path)?;
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in pairs {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

/// What one attempt produced, as seen by the classifier. Borrowed: the
/// engine keeps ownership and releases the response after classification.
#[derive(Debug, Clone, Copy)]
pub enum Attempted<'a> {
    Response(&'a HttpResponse),
    Failed(&'a TransportError),
}

/// Per-attempt facts handed to the classifier.
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    pub attempt: u32,
    pub location: StorageLocation,
    /// Policy statuses plus the operation's extras.
    pub retryable_statuses: &'a BTreeSet<u16>,
    /// True when a read on the secondary may still be retried on the primary.
    pub primary_fallback: bool,
}

impl AttemptContext<'_> {
    /// Classify a non-success status for this attempt.
    pub fn classify_status(&self, status: u16) -> ErrorKind {
        let kind = classify_status_at(status, self.location, self.retryable_statuses);
        if kind == ErrorKind::SecondaryNotFound && !self.primary_fallback {
            return ErrorKind::NonRetryable;
        }
        kind
    }
}

/// A failure the retry policy gets to judge.
#[derive(Debug)]
pub struct RetryableFailure {
    pub error: Error,
    pub classified: ClassifiedError,
}

impl RetryableFailure {
    pub fn new(error: Error, classified: impl Into<ClassifiedError>) -> Self {
        Self {
            error,
            classified: classified.into(),
        }
    }
}

/// Classifier verdict for one attempt.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Retryable(RetryableFailure),
    Fatal(Error),
}

/// Static properties of an operation.
#[derive(Debug, Clone)]
pub struct OperationMeta {
    /// Used in log lines.
    pub name: String,
    pub access: AccessKind,
    /// Timeout for each attempt; the transport default applies when unset.
    pub attempt_timeout: Option<Duration>,
    /// Overrides the policy's attempt limit for this operation.
    pub max_attempts: Option<u32>,
    /// Statuses retried for this operation in addition to the policy's.
    pub extra_retryable_statuses: Vec<u16>,
    /// Overrides the engine's location mode.
    pub location_mode: Option<LocationMode>,
    /// Every attempt targets this location.
    pub pinned_location: Option<StorageLocation>,
}

impl OperationMeta {
    fn new(name: impl Into<String>, access: AccessKind) -> Self {
        Self {
            name: name.into(),
            access,
            attempt_timeout: None,
            max_attempts: None,
            extra_retryable_statuses: Vec::new(),
            location_mode: None,
            pinned_location: None,
        }
    }

    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name, AccessKind::Read)
    }

    pub fn write(name: impl Into<String>) -> Self {
        Self::new(name, AccessKind::Write)
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_extra_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.extra_retryable_statuses.extend(statuses);
        self
    }

    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.location_mode = Some(mode);
        self
    }

    pub fn pinned_to(mut self, location: StorageLocation) -> Self {
        self.pinned_location = Some(location);
        self
    }
}

pub(crate) type BuildFn = dyn Fn(&RequestTarget<'_>) -> Result<RequestHead> + Send + Sync;
pub(crate) type ClassifyFn<T> = dyn Fn(Attempted<'_>, &AttemptContext<'_>) -> Outcome<T> + Send + Sync;

/// One logical operation, consumed by a single `execute` call.
pub struct OperationDescriptor<T> {
    pub(crate) meta: OperationMeta,
    pub(crate) build: Box<BuildFn>,
    pub(crate) classify: Box<ClassifyFn<T>>,
    pub(crate) body: RequestBody,
}

impl<T> OperationDescriptor<T> {
    /// `build` is called once per attempt with the chosen location; it must
    /// not depend on anything but its argument. `classify` borrows the
    /// attempt result and decides success, retry or failure.
    pub fn new<B, C>(meta: OperationMeta, build: B, classify: C) -> Self
    where
        B: Fn(&RequestTarget<'_>) -> Result<RequestHead> + Send + Sync + 'static,
        C: Fn(Attempted<'_>, &AttemptContext<'_>) -> Outcome<T> + Send + Sync + 'static,
    {
        Self {
            meta,
            build: Box::new(build),
            classify: Box::new(classify),
            body: RequestBody::Empty,
        }
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Pin every attempt to `location`. Writes ignore a secondary pin.
    pub fn pin_location(mut self, location: StorageLocation) -> Self {
        self.meta.pinned_location = Some(location);
        self
    }

    pub fn meta(&self) -> &OperationMeta {
        &self.meta
    }
}

impl<T> fmt::Debug for OperationDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("meta", &self.meta)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}
