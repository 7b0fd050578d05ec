//! Request execution engine.
//!
//! Turns one [`OperationDescriptor`] into one or more transport attempts:
//! picks the location for each attempt, classifies the result, consults the
//! retry policy and sleeps between attempts. This is the only retry loop in
//! the crate; pagination and polling call into it.

mod attempt;
pub mod classify;
mod descriptor;


use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::CirrusConfig;
use crate::control::OperationControl;
use crate::error::{Error, Result};
use crate::location::{Endpoints, LocationMode, LocationSelector, StorageLocation};
use crate::retry::{ErrorKind, RetryDecision, RetryPolicy, StopReason};
use crate::transport::Transport;

pub use attempt::{Executed, ExecutionSummary};
pub use descriptor::{
    AttemptContext, Attempted, OperationDescriptor, OperationMeta, Outcome, RequestTarget,
    RetryableFailure,
};

use attempt::AttemptRecord;

/// Header carrying the per-operation client request id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";
/// Header carrying the 1-based attempt number.
pub const ATTEMPT_HEADER: &str = "x-cirrus-attempt";

/// Shared, reentrant executor. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn Transport>,
    endpoints: Arc<Endpoints>,
    policy: RetryPolicy,
    location_mode: LocationMode,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("endpoints", &self.endpoints)
            .field("policy", &self.policy)
            .field("location_mode", &self.location_mode)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints: Arc::new(endpoints),
            policy: RetryPolicy::default(),
            location_mode: LocationMode::default(),
        }
    }

    /// Build from loaded configuration. Fails if the endpoints or the
    /// location mode cannot be used together.
    pub fn from_config(config: &CirrusConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let endpoints = config.endpoints()?;
        LocationSelector::new(config.location_mode, &endpoints)?;
        Ok(Self::new(transport, endpoints)
            .with_policy(config.retry_policy())
            .with_location_mode(config.location_mode))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.location_mode = mode;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn location_mode(&self) -> LocationMode {
        self.location_mode
    }

    /// Run `descriptor` with the engine's retry policy.
    pub async fn execute<T>(
        &self,
        descriptor: OperationDescriptor<T>,
        control: &OperationControl,
    ) -> Result<T> {
        self.run(descriptor, &self.policy, control)
            .await
            .map(|executed| executed.value)
    }

    /// Run `descriptor` with a caller-supplied retry policy.
    pub async fn execute_with_policy<T>(
        &self,
        descriptor: OperationDescriptor<T>,
        policy: &RetryPolicy,
        control: &OperationControl,
    ) -> Result<T> {
        self.run(descriptor, policy, control)
            .await
            .map(|executed| executed.value)
    }

    /// Like [`Engine::execute`], also reporting attempts, failovers and the
    /// location that produced the result.
    pub async fn execute_with_summary<T>(
        &self,
        descriptor: OperationDescriptor<T>,
        control: &OperationControl,
    ) -> Result<Executed<T>> {
        self.run(descriptor, &self.policy, control).await
    }

    async fn run<T>(
        &self,
        descriptor: OperationDescriptor<T>,
        policy: &RetryPolicy,
        control: &OperationControl,
    ) -> Result<Executed<T>> {
        let OperationDescriptor {
            meta,
            build,
            classify,
            mut body,
        } = descriptor;

        let policy = effective_policy(policy, meta.max_attempts, &meta.extra_retryable_statuses);
        let mode = meta.location_mode.unwrap_or(self.location_mode);
        let selector = LocationSelector::new(mode, &self.endpoints)?;
        let primary_fallback = matches!(
            selector.mode(),
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary
        ) && meta.pinned_location.is_none();
        let request_id = new_request_id();

        let mut record = AttemptRecord::new(selector.initial(meta.access, meta.pinned_location));
        control.check()?;

        loop {
            let attempt = record.begin_attempt();
            let location = record.location;
            let base = self.endpoints.get(location).ok_or_else(|| {
                Error::Config(format!("no {} endpoint configured", location))
            })?;
            let target = RequestTarget {
                location,
                base,
                attempt,
            };
            let head = build(&target)?
                .with_header(CLIENT_REQUEST_ID_HEADER, request_id.as_str())
                .with_header(ATTEMPT_HEADER, attempt.to_string());
            let timeout = attempt_timeout(meta.attempt_timeout, control);

            debug!(
                operation = %meta.name,
                attempt,
                %location,
                method = %head.method,
                url = %head.url,
                "sending attempt"
            );
            let sent = control
                .run(self.transport.send(&head, &mut body, timeout))
                .await?;

            let ctx = AttemptContext {
                attempt,
                location,
                retryable_statuses: policy.retryable_statuses(),
                primary_fallback: primary_fallback && location == StorageLocation::Secondary,
            };
            let outcome = match &sent {
                Ok(response) => classify(Attempted::Response(response), &ctx),
                Err(e) => classify(Attempted::Failed(e), &ctx),
            };
            // Release the connection before any backoff.
            drop(sent);

            let failure = match outcome {
                Outcome::Success(value) => {
                    debug!(operation = %meta.name, attempt, %location, "attempt succeeded");
                    return Ok(Executed {
                        value,
                        summary: record.summary(),
                    });
                }
                Outcome::Fatal(e) => {
                    debug!(operation = %meta.name, attempt, error = %e, "fatal error");
                    return Err(e);
                }
                Outcome::Retryable(failure) => failure,
            };

            record.observe(failure.classified.kind);
            let elapsed = record.elapsed();
            let delay = match policy.decide(attempt, &failure.classified, elapsed) {
                RetryDecision::RetryAfter(delay) => delay,
                RetryDecision::Stop(StopReason::NotRetryable) => return Err(failure.error),
                RetryDecision::Stop(reason) => {
                    warn!(
                        operation = %meta.name,
                        attempts = attempt,
                        ?elapsed,
                        ?reason,
                        error = %failure.error,
                        "giving up"
                    );
                    return Err(Error::RetryExhausted {
                        attempts: attempt,
                        elapsed,
                        last: Box::new(failure.error),
                    });
                }
            };

            body.reset().map_err(Error::NonRestartableBody)?;

            let pinned = meta.pinned_location.or(record.forced_location());
            let next = selector.next(meta.access, location, pinned);
            if failure.classified.kind == ErrorKind::SecondaryNotFound {
                warn!(operation = %meta.name, "secondary returned 404; remaining attempts use primary");
            }
            warn!(
                operation = %meta.name,
                attempt,
                kind = ?failure.classified.kind,
                ?delay,
                from = %location,
                to = %next,
                error = %failure.error,
                "retrying"
            );

            control.sleep(delay).await?;
            record.move_to(next);
        }
    }
}

fn effective_policy(base: &RetryPolicy, max_attempts: Option<u32>, extra: &[u16]) -> RetryPolicy {
    let mut policy = base.clone();
    if let Some(n) = max_attempts {
        policy = policy.with_max_attempts(n);
    }
    if !extra.is_empty() {
        let statuses: Vec<u16> = policy
            .retryable_statuses()
            .iter()
            .copied()
            .chain(extra.iter().copied())
            .collect();
        policy = policy.with_retryable_statuses(statuses);
    }
    policy
}

/// Shortest timeout handed to a transport; transports read zero as "none".
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1);

/// Per-attempt timeout, shortened so the attempt cannot outlive the deadline.
fn attempt_timeout(configured: Option<Duration>, control: &OperationControl) -> Option<Duration> {
    let timeout = match (configured, control.remaining()) {
        (Some(t), Some(left)) => Some(t.min(left)),
        (t, None) => t,
        (None, left) => left,
    };
    timeout.map(|t| t.max(MIN_ATTEMPT_TIMEOUT))
}

/// Random id in the 8-4-4-4-12 hex layout services expect.
fn new_request_id() -> String {
    let hex = format!("{:032x}", rand::random::<u128>());
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
