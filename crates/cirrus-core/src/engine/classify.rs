//! Ready-made response classifiers.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result, ServiceError};
use crate::retry::{classify_transport_error, ClassifiedError};
use crate::transport::HttpResponse;

use super::descriptor::{AttemptContext, Attempted, Outcome, RetryableFailure};

/// Default classifier: 2xx responses go through `on_success`; other
/// statuses become service errors (retryable if the context says so, with
/// any `Retry-After` hint attached); transport failures are retried when
/// they are timeouts or connection errors.
pub fn standard<T, F>(on_success: F) -> impl Fn(Attempted<'_>, &AttemptContext<'_>) -> Outcome<T> + Send + Sync + 'static
where
    T: 'static,
    F: Fn(&HttpResponse) -> Result<T> + Send + Sync + 'static,
{
    move |attempted: Attempted<'_>, ctx: &AttemptContext<'_>| match attempted {
        Attempted::Failed(e) => {
            let kind = classify_transport_error(e);
            if kind.is_transient() {
                Outcome::Retryable(RetryableFailure::new(Error::TransientNetwork(e.clone()), kind))
            } else {
                Outcome::Fatal(Error::Transport(e.clone()))
            }
        }
        Attempted::Response(response) if response.is_success() => match on_success(response) {
            Ok(value) => Outcome::Success(value),
            Err(e) => Outcome::Fatal(e),
        },
        Attempted::Response(response) => {
            let kind = ctx.classify_status(response.status);
            let service = ServiceError::from_response(response);
            if kind.is_transient() {
                let classified = ClassifiedError::new(kind).with_retry_after(response.retry_after());
                Outcome::Retryable(RetryableFailure::new(Error::RetryableService(service), classified))
            } else {
                Outcome::Fatal(Error::FatalService(service))
            }
        }
    }
}

/// Decode a JSON success body into `T`.
pub fn json<T>() -> impl Fn(Attempted<'_>, &AttemptContext<'_>) -> Outcome<T> + Send + Sync + 'static
where
    T: DeserializeOwned + 'static,
{
    standard(decode_json)
}

/// Return the raw success body.
pub fn bytes() -> impl Fn(Attempted<'_>, &AttemptContext<'_>) -> Outcome<Vec<u8>> + Send + Sync + 'static {
    standard(|response| Ok(response.body.clone()))
}

/// Ignore the success body.
pub fn empty() -> impl Fn(Attempted<'_>, &AttemptContext<'_>) -> Outcome<()> + Send + Sync + 'static {
    standard(|_| Ok(()))
}

pub fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| Error::Decode(format!("HTTP {} body: {}", response.status, e)))
}
