use std::sync::Arc;

use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::engine::classify::{decode_json, standard};
use crate::engine::{OperationMeta, RequestTarget};
use crate::location::Endpoints;
use crate::retry::RetryPolicy;
use crate::transport::{Method, RequestHead, ScriptedReply, ScriptedTransport};

fn engine(transport: &Arc<ScriptedTransport>) -> Engine {
    Engine::new(
        transport.clone(),
        Endpoints::parse("http://vault.test/", None).unwrap(),
    )
    .with_policy(
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(10))
            .with_jitter_seed(3),
    )
}

fn start_backup() -> OperationDescriptor<JobHandle> {
    OperationDescriptor::new(
        OperationMeta::write("start-backup"),
        |t: &RequestTarget<'_>| Ok(RequestHead::new(Method::Post, t.url("backup")?)),
        standard(|r| {
            let body: serde_json::Value = decode_json(r)?;
            let id = body["id"]
                .as_str()
                .ok_or_else(|| Error::Decode("missing job id".into()))?;
            Ok(JobHandle::new(id))
        }),
    )
}

fn backup_status(handle: &JobHandle) -> OperationDescriptor<JobStatus<String>> {
    let path = format!("backup/{}/pending", handle.id);
    let id = handle.id.clone();
    OperationDescriptor::new(
        OperationMeta::read("backup-status"),
        move |t: &RequestTarget<'_>| Ok(RequestHead::new(Method::Get, t.url(&path)?)),
        standard(move |r| {
            let body: serde_json::Value = decode_json(r)?;
            Ok(match body["status"].as_str() {
                Some("Succeeded") => {
                    JobStatus::Succeeded(body["result"].as_str().unwrap_or_default().to_string())
                }
                Some("Failed") => JobStatus::Failed(JobFailure::new(
                    body["error"]["code"].as_str().unwrap_or_default(),
                    body["error"]["message"].as_str().unwrap_or_default(),
                )),
                _ => JobStatus::InProgress(
                    JobHandle::new(id.clone()).with_poll_after(r.retry_after()),
                ),
            })
        }),
    )
}

fn poller(transport: &Arc<ScriptedTransport>) -> Poller<String> {
    Poller::new(engine(transport), start_backup, backup_status)
}

fn started() -> ScriptedReply {
    ScriptedReply::json(202, &json!({ "id": "job-42" }))
}

fn running() -> ScriptedReply {
    ScriptedReply::json(200, &json!({ "status": "InProgress" }))
}

fn succeeded() -> ScriptedReply {
    ScriptedReply::json(200, &json!({ "status": "Succeeded", "result": "https://blob.test/backup-1" }))
}

#[tokio::test(start_paused = true)]
async fn waits_through_progress_to_success() {
    let transport = Arc::new(ScriptedTransport::new([started(), running(), running(), succeeded()]));
    let poller = poller(&transport);
    let control = OperationControl::new();

    let state = poller.activate(&control).await.unwrap();
    assert_eq!(state.handle().map(|h| h.id.as_str()), Some("job-42"));

    let start = Instant::now();
    let done = poller.wait_for_completion(state, &control).await.unwrap();
    assert!(poller.is_terminal(&done));
    assert_eq!(
        poller.extract_result(done).unwrap(),
        "https://blob.test/backup-1"
    );
    // activate + three status calls, one interval before each.
    assert_eq!(transport.request_count(), 4);
    assert!(start.elapsed() >= DEFAULT_POLL_INTERVAL * 3);
    assert!(transport.requests()[1].url.path().ends_with("/backup/job-42/pending"));
}

#[tokio::test(start_paused = true)]
async fn extract_before_terminal_is_invalid_state() {
    let transport = Arc::new(ScriptedTransport::new([started()]));
    let poller = poller(&transport);
    assert!(matches!(
        poller.extract_result(LroState::NotStarted),
        Err(Error::InvalidState(_))
    ));
    let state = poller.activate(&OperationControl::new()).await.unwrap();
    assert!(matches!(poller.extract_result(state), Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn job_failure_is_distinct_from_poll_errors() {
    let transport = Arc::new(ScriptedTransport::new([
        started(),
        ScriptedReply::json(
            200,
            &json!({ "status": "Failed", "error": { "code": "Forbidden", "message": "no access to storage" } }),
        ),
    ]));
    let poller = poller(&transport);
    let err = poller.run(&OperationControl::new()).await.unwrap_err();
    match err {
        Error::JobFailed(failure) => {
            assert_eq!(failure.code, "Forbidden");
            assert_eq!(failure.to_string(), "Forbidden: no access to storage");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn poll_error_keeps_previous_state() {
    let transport = Arc::new(ScriptedTransport::new([
        started(),
        ScriptedReply::status(401),
        succeeded(),
    ]));
    let poller = poller(&transport);
    let control = OperationControl::new();
    let state = poller.activate(&control).await.unwrap();

    let err = poller.poll(&state, &control).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(matches!(state, LroState::InProgress(_)));

    let next = poller.poll(&state, &control).await.unwrap();
    assert!(matches!(next, LroState::Succeeded(_)));
}

#[tokio::test(start_paused = true)]
async fn terminal_and_unstarted_states_do_not_hit_the_network() {
    let transport = Arc::new(ScriptedTransport::new([]));
    let poller = poller(&transport);
    let control = OperationControl::new();

    let done: LroState<String> = LroState::Succeeded("r".into());
    assert_eq!(poller.poll(&done, &control).await.unwrap(), done);
    let failed: LroState<String> = LroState::Failed(JobFailure::new("X", "y"));
    assert_eq!(poller.poll(&failed, &control).await.unwrap(), failed);
    assert!(matches!(
        poller.poll(&LroState::NotStarted, &control).await,
        Err(Error::InvalidState(_))
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn status_retry_after_sets_poll_cadence() {
    let transport = Arc::new(ScriptedTransport::new([
        started(),
        ScriptedReply::Respond(
            crate::transport::HttpResponse::new(200)
                .with_header("Retry-After", "10")
                .with_body(json!({ "status": "InProgress" }).to_string()),
        ),
        succeeded(),
    ]));
    let poller = poller(&transport).with_poll_interval(Duration::from_millis(100));
    let control = OperationControl::new();
    let state = poller.activate(&control).await.unwrap();
    let start = Instant::now();
    poller.wait_for_completion(state, &control).await.unwrap();
    // 100ms before the first status call, then the server's 10s.
    assert!(start.elapsed() >= Duration::from_millis(10_100));
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_wait() {
    let transport = Arc::new(ScriptedTransport::with_responder(|_| running()));
    transport.push(started());
    let poller = poller(&transport);
    let control = OperationControl::new();
    let state = poller.activate(&control).await.unwrap();

    let canceller = control.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        canceller.cancel();
    });
    let err = poller.wait_for_completion(state, &control).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    // activate + polls at 1s and 2s.
    assert_eq!(transport.request_count(), 3);
}

#[test]
fn server_side_cancel_is_unsupported() {
    let transport = Arc::new(ScriptedTransport::new([]));
    let poller = poller(&transport);
    let state: LroState<String> = LroState::InProgress(JobHandle::new("job-1"));
    assert!(matches!(poller.cancel(&state), Err(Error::Unsupported(_))));
    assert!(matches!(
        poller.cancel(&LroState::NotStarted),
        Err(Error::Unsupported(_))
    ));
}
