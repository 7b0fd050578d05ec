use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server-side job identity returned by the activation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    /// Free-form progress text reported by the last status call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    /// Server hint for the next status call.
    #[serde(skip)]
    pub poll_after: Option<Duration>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status_detail: None,
            poll_after: None,
        }
    }

    pub fn with_status_detail(mut self, detail: impl Into<String>) -> Self {
        self.status_detail = Some(detail.into());
        self
    }

    pub fn with_poll_after(mut self, delay: Option<Duration>) -> Self {
        self.poll_after = delay;
        self
    }
}

/// Failure reported by the job itself (not by the transport or engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// What one status call reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus<R> {
    InProgress(JobHandle),
    Succeeded(R),
    Failed(JobFailure),
}

/// Client-side view of a long-running operation.
///
/// `NotStarted -> InProgress -> (Succeeded | Failed)`. Terminal states never
/// change; a new state is a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LroState<R> {
    NotStarted,
    InProgress(JobHandle),
    Succeeded(R),
    Failed(JobFailure),
}

impl<R> Default for LroState<R> {
    fn default() -> Self {
        LroState::NotStarted
    }
}

impl<R> LroState<R> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LroState::Succeeded(_) | LroState::Failed(_))
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        match self {
            LroState::InProgress(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LroState::NotStarted => "not-started",
            LroState::InProgress(_) => "in-progress",
            LroState::Succeeded(_) => "succeeded",
            LroState::Failed(_) => "failed",
        }
    }
}

impl<R> From<JobStatus<R>> for LroState<R> {
    fn from(status: JobStatus<R>) -> Self {
        match status {
            JobStatus::InProgress(handle) => LroState::InProgress(handle),
            JobStatus::Succeeded(result) => LroState::Succeeded(result),
            JobStatus::Failed(failure) => LroState::Failed(failure),
        }
    }
}
