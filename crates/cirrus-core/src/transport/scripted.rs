//! In-memory transport that replays scripted replies and records every
//! request it sees. Used as the engine's fake in tests; exported so client
//! crates can test their descriptors without a server.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{
    Headers, HttpResponse, Method, RequestBody, RequestHead, Transport, TransportError,
    TransportErrorKind,
};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Wait (on tokio's clock) before resolving the inner reply.
    Delayed(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    pub fn status(status: u16) -> Self {
        ScriptedReply::Respond(HttpResponse::new(status))
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        ScriptedReply::Respond(
            HttpResponse::new(status)
                .with_header("content-type", "application/json")
                .with_body(value.to_string()),
        )
    }

    pub fn fail(kind: TransportErrorKind) -> Self {
        ScriptedReply::Fail(TransportError::new(kind, format!("scripted {} failure", kind)))
    }

    pub fn delayed(self, delay: Duration) -> Self {
        ScriptedReply::Delayed(delay, Box::new(self))
    }
}

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub timeout: Option<Duration>,
}

impl RecordedRequest {
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

type Responder = dyn Fn(&RecordedRequest) -> ScriptedReply + Send + Sync;

/// Queued replies are used first; once the queue is empty the responder
/// (if any) answers. With neither, requests fail with an `Other` error.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    responder: Option<Box<Responder>>,
    recorded: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            responder: None,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request by calling `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> ScriptedReply + Send + Sync + 'static,
    {
        Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Snapshot of every request sent so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_reply(&self, request: &RecordedRequest) -> ScriptedReply {
        let queued = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match (queued, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(request),
            (None, None) => ScriptedReply::Fail(TransportError::new(
                TransportErrorKind::Other,
                "script exhausted",
            )),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &RequestHead,
        body: &mut RequestBody,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        let payload = body
            .read_to_vec()
            .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        let recorded = RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: payload,
            timeout,
        };
        let mut reply = self.next_reply(&recorded);
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(recorded);

        loop {
            match reply {
                ScriptedReply::Respond(response) => return Ok(response),
                ScriptedReply::Fail(error) => return Err(error),
                ScriptedReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(url: &str) -> RequestHead {
        RequestHead::new(Method::Get, Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn queue_then_responder() {
        let transport = ScriptedTransport::with_responder(|_| ScriptedReply::status(204));
        transport.push(ScriptedReply::status(500));

        let mut body = RequestBody::Empty;
        let first = transport
            .send(&head("http://primary.test/a"), &mut body, None)
            .await
            .unwrap();
        let second = transport
            .send(&head("http://primary.test/b?marker=x"), &mut body, None)
            .await
            .unwrap();
        assert_eq!(first.status, 500);
        assert_eq!(second.status, 204);

        let seen = transport.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].query("marker").as_deref(), Some("x"));
        assert_eq!(seen[0].host(), Some("primary.test"));
    }

    #[tokio::test]
    async fn exhausted_script_fails() {
        let transport = ScriptedTransport::new([]);
        let mut body = RequestBody::Empty;
        let err = transport
            .send(&head("http://primary.test/"), &mut body, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_reply_waits_on_tokio_clock() {
        let transport =
            ScriptedTransport::new([ScriptedReply::status(200).delayed(Duration::from_secs(5))]);
        let start = tokio::time::Instant::now();
        let mut body = RequestBody::Empty;
        transport
            .send(&head("http://primary.test/"), &mut body, None)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
