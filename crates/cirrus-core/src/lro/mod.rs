//! Long-running operation poller.
//!
//! A job is started with one activation call and then observed through status
//! calls until it reaches a terminal state. Every network call goes through
//! the engine, so each poll gets the same retry and failover behaviour as any
//! other operation.

mod state;

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::control::OperationControl;
use crate::engine::{Engine, OperationDescriptor};
use crate::error::{Error, Result};

pub use state::{JobFailure, JobHandle, JobStatus, LroState};

/// Default wait between status calls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

type ActivateFn = dyn Fn() -> OperationDescriptor<JobHandle> + Send + Sync;
type StatusFn<R> = dyn Fn(&JobHandle) -> OperationDescriptor<JobStatus<R>> + Send + Sync;

pub struct Poller<R> {
    engine: Engine,
    activate: Box<ActivateFn>,
    status: Box<StatusFn<R>>,
    interval: Duration,
}

impl<R> fmt::Debug for Poller<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl<R: Clone> Poller<R> {
    pub fn new<A, S>(engine: Engine, activate: A, status: S) -> Self
    where
        A: Fn() -> OperationDescriptor<JobHandle> + Send + Sync + 'static,
        S: Fn(&JobHandle) -> OperationDescriptor<JobStatus<R>> + Send + Sync + 'static,
    {
        Self {
            engine,
            activate: Box::new(activate),
            status: Box::new(status),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    /// Start the job: `NotStarted -> InProgress`.
    pub async fn activate(&self, control: &OperationControl) -> Result<LroState<R>> {
        let handle = self.engine.execute((self.activate)(), control).await?;
        info!(job = %handle.id, "job started");
        Ok(LroState::InProgress(handle))
    }

    /// One status call for an in-progress job. Terminal states come back
    /// unchanged without touching the network. On error the caller still
    /// holds `state` and may poll again.
    pub async fn poll(&self, state: &LroState<R>, control: &OperationControl) -> Result<LroState<R>> {
        let handle = match state {
            LroState::NotStarted => {
                return Err(Error::InvalidState("cannot poll a job that was never started".into()))
            }
            LroState::Succeeded(_) | LroState::Failed(_) => return Ok(state.clone()),
            LroState::InProgress(handle) => handle,
        };

        let next = LroState::from(self.engine.execute((self.status)(handle), control).await?);
        match &next {
            LroState::InProgress(h) => debug!(
                job = %handle.id,
                detail = h.status_detail.as_deref().unwrap_or(""),
                "job still running"
            ),
            LroState::Failed(failure) => info!(job = %handle.id, %failure, "job failed"),
            other => info!(job = %handle.id, state = other.name(), "job finished"),
        }
        Ok(next)
    }

    pub fn is_terminal(&self, state: &LroState<R>) -> bool {
        state.is_terminal()
    }

    /// Result of a succeeded job.
    pub fn extract_result(&self, state: LroState<R>) -> Result<R> {
        match state {
            LroState::Succeeded(result) => Ok(result),
            LroState::Failed(failure) => Err(Error::JobFailed(failure)),
            other => Err(Error::InvalidState(format!(
                "job result requested while {}",
                other.name()
            ))),
        }
    }

    /// Poll until terminal, waiting the poll interval (or the server's
    /// hint) before every status call. The wait is cancellable.
    pub async fn wait_for_completion(
        &self,
        state: LroState<R>,
        control: &OperationControl,
    ) -> Result<LroState<R>> {
        let mut state = state;
        loop {
            if state.is_terminal() {
                return Ok(state);
            }
            let wait = match state.handle() {
                Some(handle) => handle.poll_after.unwrap_or(self.interval),
                None => {
                    return Err(Error::InvalidState(
                        "cannot wait for a job that was never started".into(),
                    ))
                }
            };
            control.sleep(wait).await?;
            state = self.poll(&state, control).await?;
        }
    }

    /// Server-side cancellation is not offered for these jobs.
    pub fn cancel(&self, state: &LroState<R>) -> Result<()> {
        Err(Error::Unsupported(format!(
            "cancelling a long-running job ({})",
            state.name()
        )))
    }

    /// Activate, wait and extract in one call.
    pub async fn run(&self, control: &OperationControl) -> Result<R> {
        let started = self.activate(control).await?;
        let done = self.wait_for_completion(started, control).await?;
        self.extract_result(done)
    }
}

#[cfg(test)]
mod tests;
