use super::token::ContinuationToken;

/// What a page descriptor's classifier produces: the page's items and the
/// server's raw continuation marker, if there are more pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        // Some services send an empty marker on the last page.
        let next = next.filter(|marker| !marker.is_empty());
        Self { items, next }
    }
}

/// One page as handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the following page; `None` on the last page.
    pub continuation: Option<ContinuationToken>,
}

/// Arguments for building the descriptor of one page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// `None` for the first page of a query.
    pub continuation: Option<&'a ContinuationToken>,
    /// Maximum results per page, if the caller asked for one.
    pub page_size: Option<u32>,
}
