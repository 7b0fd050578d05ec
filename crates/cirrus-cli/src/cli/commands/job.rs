//! `cirrus job <start-path> --status <status-path>` – run a long-running job.

use anyhow::Result;
use cirrus_core::engine::classify::{decode_json, standard};
use cirrus_core::engine::RequestTarget;
use cirrus_core::transport::{HttpResponse, Method, RequestHead};
use cirrus_core::{
    Error, JobFailure, JobHandle, JobStatus, OperationDescriptor, OperationMeta, Poller,
};
use serde::Deserialize;

use crate::cli::Session;

#[derive(Debug, Deserialize)]
struct Started {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    status_details: Option<String>,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// Map a status response onto the job's state.
fn parse_status(id: &str, response: &HttpResponse) -> cirrus_core::Result<JobStatus<serde_json::Value>> {
    let body: StatusBody = decode_json(response)?;
    match body.status.to_ascii_lowercase().as_str() {
        "succeeded" | "completed" => Ok(JobStatus::Succeeded(body.result)),
        "failed" | "canceled" | "cancelled" => {
            let error = body.error.unwrap_or_default();
            let code = if error.code.is_empty() {
                body.status
            } else {
                error.code
            };
            Ok(JobStatus::Failed(JobFailure::new(code, error.message)))
        }
        "inprogress" | "running" | "notstarted" => {
            let mut handle = JobHandle::new(id).with_poll_after(response.retry_after());
            if let Some(detail) = body.status_details {
                handle = handle.with_status_detail(detail);
            }
            Ok(JobStatus::InProgress(handle))
        }
        other => Err(Error::Decode(format!("unknown job status {:?}", other))),
    }
}

fn status_path(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}

pub async fn run_job(session: &Session, start_path: &str, status: &str) -> Result<()> {
    let start = start_path.to_string();
    let timeout = session.attempt_timeout();
    let status_base = status.to_string();

    let poller = Poller::new(
        session.engine.clone(),
        move || {
            let start = start.clone();
            OperationDescriptor::new(
                OperationMeta::write(format!("start {start}")).with_attempt_timeout(timeout),
                move |t: &RequestTarget<'_>| Ok(RequestHead::new(Method::Post, t.url(&start)?)),
                standard(|r| {
                    let started: Started = decode_json(r)?;
                    Ok(JobHandle::new(started.id).with_poll_after(r.retry_after()))
                }),
            )
        },
        move |handle: &JobHandle| {
            let path = status_path(&status_base, &handle.id);
            let id = handle.id.clone();
            OperationDescriptor::new(
                OperationMeta::read(format!("status {}", handle.id)).with_attempt_timeout(timeout),
                move |t: &RequestTarget<'_>| Ok(RequestHead::new(Method::Get, t.url(&path)?)),
                standard(move |r| parse_status(&id, r)),
            )
        },
    )
    .with_poll_interval(session.config.poll_interval());

    let state = poller.activate(&session.control).await?;
    if let Some(handle) = state.handle() {
        eprintln!("job {} started", handle.id);
    }
    let done = poller.wait_for_completion(state, &session.control).await?;
    let result = poller.extract_result(done)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn response(body: &str) -> HttpResponse {
        HttpResponse::new(200).with_body(body)
    }

    #[test]
    fn in_progress_keeps_id_and_hint() {
        let r = response(r#"{"status":"InProgress","status_details":"copying"}"#)
            .with_header("Retry-After", "5");
        match parse_status("job-1", &r).unwrap() {
            JobStatus::InProgress(h) => {
                assert_eq!(h.id, "job-1");
                assert_eq!(h.status_detail.as_deref(), Some("copying"));
                assert_eq!(h.poll_after, Some(Duration::from_secs(5)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failed_carries_error_code() {
        let r = response(r#"{"status":"Failed","error":{"code":"Forbidden","message":"denied"}}"#);
        match parse_status("job-1", &r).unwrap() {
            JobStatus::Failed(f) => assert_eq!(f, JobFailure::new("Forbidden", "denied")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn succeeded_returns_result() {
        let r = response(r#"{"status":"Succeeded","result":{"url":"https://blob.test/b"}}"#);
        match parse_status("job-1", &r).unwrap() {
            JobStatus::Succeeded(v) => assert_eq!(v["url"], "https://blob.test/b"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_decode_error() {
        let r = response(r#"{"status":"Exploded"}"#);
        assert!(matches!(parse_status("job-1", &r), Err(Error::Decode(_))));
    }

    #[test]
    fn status_path_joins_id() {
        assert_eq!(status_path("backup/", "42"), "backup/42");
        assert_eq!(status_path("jobs", "a"), "jobs/a");
    }
}
