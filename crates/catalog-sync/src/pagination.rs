//! Whole-collection retrieval over a page-limited list endpoint.
//!
//! The first page reports the total; the remaining pages are addressed by
//! fixed offsets, fetched concurrently and reassembled by page index.

use std::future::Future;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::RemotePage;
use crate::{SyncError, SyncResult};

/// Number of pages still needed after the first one.
#[must_use]
pub fn remaining_pages(total_count: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    total_count.saturating_sub(page_size).div_ceil(page_size)
}

/// Fetches every page of a collection through `fetch(start, limit)`.
///
/// Pages after the first are requested with at most `max_concurrency` in
/// flight. Any page failure fails the whole fetch and no partial result is
/// returned. `cancel` is honoured between pages.
///
/// # Errors
///
/// Returns the first page error, `SyncError::Protocol` when a page holds
/// more items than requested or the first page is short while `totalCount`
/// promises more, or `SyncError::Cancelled`.
pub async fn fetch_all_pages<T, F, Fut>(
    page_size: u32,
    max_concurrency: usize,
    cancel: &CancellationToken,
    fetch: F,
) -> SyncResult<Vec<T>>
where
    F: Fn(u64, u32) -> Fut,
    Fut: Future<Output = SyncResult<RemotePage<T>>>,
{
    if page_size == 0 {
        return Err(SyncError::Config("page_size must be > 0".to_string()));
    }

    let first = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SyncError::Cancelled),
        page = fetch(0, page_size) => page?,
    };
    check_page_len(0, first.items.len(), page_size)?;

    let total_count = first.total_count;
    if total_count > u64::from(page_size) && first.items.len() < page_size as usize {
        return Err(SyncError::Protocol(format!(
            "first page returned {} items for limit {page_size} but totalCount is {total_count}",
            first.items.len()
        )));
    }
    let remaining = remaining_pages(total_count, page_size);
    debug!(total_count, page_size, remaining, "Fetched first page");

    if remaining == 0 {
        return Ok(first.items);
    }

    let fetch = &fetch;
    let mut pending = stream::iter(1..=remaining)
        .map(|index| {
            let start = index * u64::from(page_size);
            let fut = fetch(start, page_size);
            async move { (index, fut.await) }
        })
        .buffer_unordered(max_concurrency.max(1));

    let mut pages: Vec<(u64, Vec<T>)> = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
            next = pending.next() => next,
        };
        let Some((index, result)) = next else {
            break;
        };
        let page = result?;
        check_page_len(index, page.items.len(), page_size)?;
        debug!(page = index, items = page.items.len(), "Fetched page");
        pages.push((index, page.items));
    }

    pages.sort_by_key(|(index, _)| *index);

    let mut items = first.items;
    for (_, page_items) in pages {
        items.extend(page_items);
    }

    if items.len() as u64 != total_count {
        warn!(
            expected = total_count,
            received = items.len(),
            "Collection size changed during fetch"
        );
    }

    Ok(items)
}

fn check_page_len(index: u64, len: usize, limit: u32) -> SyncResult<()> {
    if len as u64 > u64::from(limit) {
        return Err(SyncError::Protocol(format!(
            "page {index} returned {len} items for limit {limit}"
        )));
    }
    Ok(())
}
