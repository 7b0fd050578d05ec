//! `cirrus get <path>` – read one resource through the engine.

use anyhow::Result;
use cirrus_core::engine::{classify, RequestTarget};
use cirrus_core::transport::{Method, RequestHead};
use cirrus_core::{OperationDescriptor, OperationMeta};
use std::io::Write;

use crate::cli::Session;

pub async fn run_get(session: &Session, path: &str, summary: bool) -> Result<()> {
    let owned = path.to_string();
    let descriptor = OperationDescriptor::new(
        OperationMeta::read(format!("get {path}")).with_attempt_timeout(session.attempt_timeout()),
        move |t: &RequestTarget<'_>| Ok(RequestHead::new(Method::Get, t.url(&owned)?)),
        classify::bytes(),
    );
    let executed = session
        .engine
        .execute_with_summary(descriptor, &session.control)
        .await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&executed.value)?;
    stdout.flush()?;

    if summary {
        let s = executed.summary;
        eprintln!(
            "attempts={} failovers={} throttled={} location={} elapsed={:?}",
            s.attempts, s.failovers, s.throttle_events, s.location, s.elapsed
        );
    }
    Ok(())
}
