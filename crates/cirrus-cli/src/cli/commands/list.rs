//! `cirrus list <path>` – walk a paged JSON collection.
//!
//! Pages look like `{"value": [...], "nextMarker": "..."}`; the marker is
//! sent back as the `marker` query parameter and the page size as
//! `maxresults`.

use anyhow::Result;
use cirrus_core::engine::classify::{decode_json, standard};
use cirrus_core::engine::RequestTarget;
use cirrus_core::transport::{Method, RequestHead};
use cirrus_core::{
    ContinuationToken, OperationDescriptor, OperationMeta, PageRequest, PageResponse, Segmented,
    StorageLocation,
};
use serde::Deserialize;
use std::time::Duration;

use crate::cli::Session;

#[derive(Debug, Default)]
pub struct ListOptions {
    pub page_size: Option<u32>,
    pub print_pages: bool,
    pub max_pages: Option<u64>,
    pub marker: Option<String>,
    pub marker_location: Option<StorageLocation>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    value: Vec<serde_json::Value>,
    #[serde(rename = "nextMarker", alias = "nextLink", default)]
    next_marker: Option<String>,
}

/// Token to resume from; markers are only valid on the endpoint that issued them.
fn resume_token(marker: String, location: Option<StorageLocation>) -> ContinuationToken {
    let token = ContinuationToken::new(marker);
    match location {
        Some(location) => token.with_location(location),
        None => token,
    }
}

/// Flags that resume a listing at `token`.
fn resume_hint(token: &ContinuationToken) -> String {
    match token.location() {
        Some(location) => format!("--marker {} --marker-location {}", token.as_str(), location),
        None => format!("--marker {}", token.as_str()),
    }
}

fn page_descriptor(
    path: &str,
    request: &PageRequest<'_>,
    attempt_timeout: Duration,
) -> OperationDescriptor<PageResponse<serde_json::Value>> {
    let path = path.to_string();
    let marker = request.continuation.map(|t| t.as_str().to_string());
    let page_size = request.page_size.map(|n| n.to_string());
    OperationDescriptor::new(
        OperationMeta::read(format!("list {path}")).with_attempt_timeout(attempt_timeout),
        move |t: &RequestTarget<'_>| {
            let mut url = t.url(&path)?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(m) = &marker {
                    query.append_pair("marker", m);
                }
                if let Some(n) = &page_size {
                    query.append_pair("maxresults", n);
                }
            }
            Ok(RequestHead::new(Method::Get, url))
        },
        standard(|r| {
            let page: ListPage = decode_json(r)?;
            Ok(PageResponse::new(page.value, page.next_marker))
        }),
    )
}

pub async fn run_list(session: &Session, path: &str, opts: ListOptions) -> Result<()> {
    let owned = path.to_string();
    let timeout = session.attempt_timeout();
    let factory = move |req: &PageRequest<'_>| page_descriptor(&owned, req, timeout);
    let engine = session.engine.clone();
    let mut listing = match opts.marker {
        Some(marker) => {
            let token = resume_token(marker, opts.marker_location);
            Segmented::resume_from(engine, factory, token)
        }
        None => Segmented::new(engine, factory),
    };
    if let Some(n) = opts.page_size {
        listing = listing.with_page_size(n);
    }

    let mut total = 0usize;
    while let Some(page) = listing.next_page(&session.control).await? {
        if opts.print_pages {
            println!("# page {} ({} items)", listing.pages_fetched(), page.items.len());
        }
        for item in &page.items {
            println!("{}", item);
        }
        total += page.items.len();

        if let Some(limit) = opts.max_pages {
            if listing.pages_fetched() >= limit {
                if let Some(next) = &page.continuation {
                    eprintln!("more results; resume with {}", resume_hint(next));
                }
                break;
            }
        }
    }
    tracing::info!(path, total, pages = listing.pages_fetched(), "listing finished");
    Ok(())
}
