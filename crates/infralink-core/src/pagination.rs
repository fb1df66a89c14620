//! Pagination aggregator
//!
//! Follows next-page cursors until exhausted. The merged list is exactly the
//! concatenation of the pages in arrival order; nothing is sorted, removed or
//! capped, since filtering and identifier synthesis need the full result.

use crate::error::Result;
use std::future::Future;

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Cursor for the next page; `None` (or empty) on the last page
    pub next_page: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_page: Option<String>) -> Self {
        Self { items, next_page }
    }

    /// A page with no successor
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }
}

/// Fetch every page and concatenate their items
///
/// `fetch` receives the cursor for the page to fetch, `None` for the first.
pub async fn collect_all<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    let mut pages = 0usize;

    loop {
        let page = fetch(cursor.take()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_page {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    tracing::debug!("Collected {} items from {} pages", items.len(), pages);
    Ok(items)
}
