//! `cirrus put <path> (--file F | --stdin)` – upload one resource.

use anyhow::{Context, Result};
use cirrus_core::engine::{classify, RequestTarget};
use cirrus_core::transport::{Method, OneShot, RequestBody, RequestHead, Seekable};
use cirrus_core::{OperationDescriptor, OperationMeta};
use std::fs::File;
use std::path::PathBuf;

use crate::cli::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutSource {
    File(PathBuf),
    Stdin,
}

impl PutSource {
    /// Files rewind for retries; stdin can only be read once.
    fn open(&self) -> Result<RequestBody> {
        match self {
            PutSource::File(path) => {
                let file =
                    File::open(path).with_context(|| format!("opening {}", path.display()))?;
                Ok(RequestBody::stream(Seekable::new(file)?))
            }
            PutSource::Stdin => Ok(RequestBody::stream(OneShot::new(std::io::stdin()))),
        }
    }
}

pub async fn run_put(session: &Session, path: &str, source: PutSource) -> Result<()> {
    let body = source.open()?;
    let owned = path.to_string();
    let descriptor = OperationDescriptor::new(
        OperationMeta::write(format!("put {path}")).with_attempt_timeout(session.attempt_timeout()),
        move |t: &RequestTarget<'_>| Ok(RequestHead::new(Method::Put, t.url(&owned)?)),
        classify::empty(),
    )
    .with_body(body);

    let executed = session
        .engine
        .execute_with_summary(descriptor, &session.control)
        .await?;
    println!(
        "uploaded {} ({} attempt(s))",
        path, executed.summary.attempts
    );
    Ok(())
}
