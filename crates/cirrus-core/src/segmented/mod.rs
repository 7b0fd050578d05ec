//! Continuation-token pagination over the engine.
//!
//! A [`Segmented`] iterator fetches one page per engine call, strictly in
//! order, and exposes the same state through a per-page view
//! ([`Segmented::next_page`]) and a flat per-item view
//! ([`Segmented::next_item`]).

mod page;
mod token;

use std::collections::VecDeque;
use std::fmt;

use futures::stream::{self, Stream};
use tracing::debug;

use crate::control::OperationControl;
use crate::engine::{Engine, OperationDescriptor};
use crate::error::Result;

pub use page::{Page, PageRequest, PageResponse};
pub use token::ContinuationToken;

type PageFactory<T> = dyn Fn(&PageRequest<'_>) -> OperationDescriptor<PageResponse<T>> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SegmentState {
    /// Next fetch sends this token (`None`: first page of the query).
    Ready(Option<ContinuationToken>),
    Done,
}

/// Iterator over a segmented (paged) listing.
pub struct Segmented<T> {
    engine: Engine,
    factory: Box<PageFactory<T>>,
    state: SegmentState,
    buffered: VecDeque<T>,
    page_size: Option<u32>,
    pages_fetched: u64,
}

impl<T> fmt::Debug for Segmented<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segmented")
            .field("state", &self.state)
            .field("buffered", &self.buffered.len())
            .field("page_size", &self.page_size)
            .field("pages_fetched", &self.pages_fetched)
            .finish_non_exhaustive()
    }
}

impl<T> Segmented<T> {
    /// `factory` builds the descriptor for one page; it receives the token
    /// of the page to fetch and must thread it into the request (for
    /// example as a `marker` query parameter).
    pub fn new<F>(engine: Engine, factory: F) -> Self
    where
        F: Fn(&PageRequest<'_>) -> OperationDescriptor<PageResponse<T>> + Send + Sync + 'static,
    {
        Self {
            engine,
            factory: Box::new(factory),
            state: SegmentState::Ready(None),
            buffered: VecDeque::new(),
            page_size: None,
            pages_fetched: 0,
        }
    }

    /// Continue a listing from a saved token. The factory must build the
    /// same query that issued the token.
    pub fn resume_from<F>(engine: Engine, factory: F, token: ContinuationToken) -> Self
    where
        F: Fn(&PageRequest<'_>) -> OperationDescriptor<PageResponse<T>> + Send + Sync + 'static,
    {
        let mut segmented = Self::new(engine, factory);
        segmented.state = SegmentState::Ready(Some(token));
        segmented
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Token the next fetch will send, if any.
    pub fn continuation(&self) -> Option<&ContinuationToken> {
        match &self.state {
            SegmentState::Ready(token) => token.as_ref(),
            SegmentState::Done => None,
        }
    }

    /// True once the last page was fetched and every buffered item consumed.
    pub fn is_done(&self) -> bool {
        self.state == SegmentState::Done && self.buffered.is_empty()
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Drop the held token and buffered items; the next fetch starts a new
    /// query.
    pub fn restart(&mut self) {
        self.state = SegmentState::Ready(None);
        self.buffered.clear();
        self.pages_fetched = 0;
    }

    /// Next page, or `None` when the listing is exhausted. Items already
    /// buffered by [`Segmented::next_item`] are returned first as a page of
    /// their own.
    pub async fn next_page(&mut self, control: &OperationControl) -> Result<Option<Page<T>>> {
        if !self.buffered.is_empty() {
            return Ok(Some(Page {
                items: self.buffered.drain(..).collect(),
                continuation: self.continuation().cloned(),
            }));
        }
        self.fetch(control).await
    }

    /// Next item, fetching pages as needed. Empty pages that still carry a
    /// continuation token are skipped.
    pub async fn next_item(&mut self, control: &OperationControl) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Ok(Some(item));
            }
            match self.fetch(control).await? {
                Some(page) => self.buffered.extend(page.items),
                None => return Ok(None),
            }
        }
    }

    /// Drain the remaining items.
    pub async fn collect_all(&mut self, control: &OperationControl) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item(control).await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Flat view as a stream. The stream ends after yielding an error.
    pub fn into_stream(self, control: OperationControl) -> impl Stream<Item = Result<T>> {
        stream::unfold(Some((self, control)), |carry| async move {
            let (mut segmented, control) = carry?;
            match segmented.next_item(&control).await {
                Ok(Some(item)) => Some((Ok(item), Some((segmented, control)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// One engine call. State only advances after a successful fetch, so a
    /// failed page is re-requested by the next call.
    async fn fetch(&mut self, control: &OperationControl) -> Result<Option<Page<T>>> {
        let token = match &self.state {
            SegmentState::Done => return Ok(None),
            SegmentState::Ready(token) => token.as_ref(),
        };
        let request = PageRequest {
            continuation: token,
            page_size: self.page_size,
        };
        let mut descriptor = (self.factory)(&request);
        if let Some(location) = token.and_then(ContinuationToken::location) {
            descriptor = descriptor.pin_location(location);
        }

        let executed = self.engine.execute_with_summary(descriptor, control).await?;
        self.pages_fetched += 1;

        let PageResponse { items, next } = executed.value;
        let continuation =
            next.map(|marker| ContinuationToken::new(marker).with_location(executed.summary.location));
        debug!(
            page = self.pages_fetched,
            items = items.len(),
            more = continuation.is_some(),
            location = %executed.summary.location,
            "fetched page"
        );
        self.state = match &continuation {
            Some(token) => SegmentState::Ready(Some(token.clone())),
            None => SegmentState::Done,
        };
        Ok(Some(Page {
            items,
            continuation,
        }))
    }
}
