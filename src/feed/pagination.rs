//! Batch page fetching and append-only accumulation.
//!
//! A load cycle fetches a fixed window of consecutive pages. The loop
//! invariant is simple: merge pages in page order and stop at the first
//! page whose reported number reaches the reported total, or at the first
//! failure. Everything merged before the stop is kept.

use futures::future::join_all;
use std::collections::HashSet;

use crate::media::{MediaSummary, MediaType};
use crate::tmdb::{FetchError, MetadataSource, Query, RawItem};

/// Pages fetched per load cycle unless configured otherwise.
pub const DEFAULT_PAGE_WINDOW: u32 = 2;

/// Largest window accepted. Every page of a window is requested at once.
pub const MAX_PAGE_WINDOW: u32 = 10;

/// Consecutive pages `start..start + size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: u32,
    pub size: u32,
}

impl PageWindow {
    pub fn new(start: u32, size: u32) -> Self {
        Self {
            start: start.max(1),
            size: size.max(1),
        }
    }

    /// Last page of the window, clamped to the total when it is known.
    fn last(&self, known_total: Option<u32>) -> u32 {
        let last = self.start.saturating_add(self.size - 1);
        known_total.map_or(last, |total| last.min(total))
    }

    /// Window immediately after this one.
    pub fn next(&self) -> Self {
        Self::new(self.start.saturating_add(self.size), self.size)
    }
}

/// Result of one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Pages actually requested from the source.
    pub requested: Vec<u32>,
    /// Records from the merged pages, in page order.
    pub items: Vec<RawItem>,
    /// Highest page merged.
    pub last_page: Option<u32>,
    pub total_pages: Option<u32>,
    /// The upstream bound was reached; no further pages exist.
    pub exhausted: bool,
    /// First failure, if any. Pages after it were not merged.
    pub failure: Option<FetchError>,
}

/// Fetches every page of `window` concurrently and folds the responses in
/// page order.
///
/// When the total page count is already known the window is clamped to it,
/// so a batch never asks for a page past the end.
pub async fn fetch_window(
    source: &dyn MetadataSource,
    endpoint: &str,
    query: &Query,
    window: PageWindow,
    known_total: Option<u32>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        total_pages: known_total,
        ..BatchOutcome::default()
    };

    let last = window.last(known_total);
    if window.start > last {
        outcome.exhausted = true;
        return outcome;
    }

    outcome.requested = (window.start..=last).collect();
    let requests = outcome.requested.iter().map(|&page| {
        let query = query.clone().with("page", page);
        async move { (page, source.fetch_page(endpoint, &query).await) }
    });
    let responses = join_all(requests).await;

    for (page, response) in responses {
        match response {
            Ok(response) => {
                let reported = if response.page == 0 { page } else { response.page };
                outcome.items.extend(response.results);
                outcome.last_page = Some(page);
                outcome.total_pages = Some(response.total_pages);
                if reported >= response.total_pages {
                    outcome.exhausted = true;
                    break;
                }
            }
            Err(e) => {
                outcome.failure = Some(e);
                break;
            }
        }
    }

    outcome
}

/// Accumulated items of one feed, unique by id in arrival order.
///
/// `has_more` starts `true` and can only ever be cleared.
#[derive(Debug, Clone)]
pub struct Accumulator {
    items: Vec<MediaSummary>,
    seen: HashSet<u64>,
    has_more: bool,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            has_more: true,
        }
    }
}

impl Accumulator {
    /// Accumulator seeded with a finished set (no further pages).
    pub fn complete(items: impl IntoIterator<Item = MediaSummary>) -> Self {
        let mut acc = Self::default();
        acc.extend(items);
        acc.close();
        acc
    }

    /// Appends items whose id has not been seen; returns how many were added.
    pub fn extend(&mut self, items: impl IntoIterator<Item = MediaSummary>) -> usize {
        let before = self.items.len();
        for item in items {
            if self.seen.insert(item.id) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    /// Normalises and appends raw records.
    pub fn extend_raw(&mut self, raw: &[RawItem], media_type: MediaType) -> usize {
        self.extend(raw.iter().map(|r| MediaSummary::from_raw(r, media_type)))
    }

    /// Marks the upstream bound reached. Irreversible.
    pub fn close(&mut self) {
        self.has_more = false;
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn items(&self) -> &[MediaSummary] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmdb::fake::{item, Reply, ScriptedSource};
    use crate::tmdb::PageResponse;
    use proptest::prelude::*;

    const ENDPOINT: &str = "/movie/popular";

    #[tokio::test]
    async fn test_window_stops_at_total() {
        let source = ScriptedSource::new().list(ENDPOINT, 3, 5);
        let query = Query::new("en-US");

        let first = fetch_window(&source, ENDPOINT, &query, PageWindow::new(1, 2), None).await;
        assert_eq!(first.requested, [1, 2]);
        assert_eq!(first.items.len(), 10);
        assert!(!first.exhausted);
        assert_eq!(first.total_pages, Some(3));

        let second = fetch_window(&source, ENDPOINT, &query, PageWindow::new(3, 2), first.total_pages).await;
        assert_eq!(second.requested, [3]);
        assert!(second.exhausted);
        assert_eq!(source.pages_requested(ENDPOINT), [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_bound_reached_mid_window_discards_later_pages() {
        let source = ScriptedSource::new().list(ENDPOINT, 1, 4).page(
            ENDPOINT,
            2,
            PageResponse {
                results: vec![item(999, "stray")],
                page: 2,
                total_pages: 1,
            },
        );

        let outcome = fetch_window(&source, ENDPOINT, &Query::new("en-US"), PageWindow::new(1, 2), None).await;
        assert!(outcome.exhausted);
        assert_eq!(outcome.last_page, Some(1));
        assert!(outcome.items.iter().all(|i| i.id != 999));
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_pages() {
        let source = ScriptedSource::new()
            .list(ENDPOINT, 5, 3)
            .fail(ENDPOINT, 2, Reply::Status(500));

        let outcome = fetch_window(&source, ENDPOINT, &Query::new("en-US"), PageWindow::new(1, 3), None).await;
        assert_eq!(outcome.items.len(), 3);
        assert_eq!(outcome.last_page, Some(1));
        assert!(outcome.failure.is_some());
        assert!(!outcome.exhausted);
    }

    #[tokio::test]
    async fn test_window_past_known_total_requests_nothing() {
        let source = ScriptedSource::new().list(ENDPOINT, 2, 1);
        let outcome = fetch_window(&source, ENDPOINT, &Query::new("en-US"), PageWindow::new(3, 2), Some(2)).await;
        assert!(outcome.requested.is_empty());
        assert!(outcome.exhausted);
        assert_eq!(source.count(ENDPOINT), 0);
    }

    #[test]
    fn test_window_next_advances_by_size() {
        assert_eq!(PageWindow::new(1, 2).next(), PageWindow::new(3, 2));
        assert_eq!(PageWindow::new(0, 0), PageWindow::new(1, 1));
    }

    #[test]
    fn test_window_bounds_saturate() {
        let wide = PageWindow::new(1, u32::MAX);
        assert_eq!(wide.last(None), u32::MAX);
        assert_eq!(wide.last(Some(7)), 7);
        assert_eq!(wide.next().start, u32::MAX);
        assert_eq!(PageWindow::new(u32::MAX, 2).next().last(None), u32::MAX);
    }

    #[test]
    fn test_accumulator_dedups_across_batches() {
        let mut acc = Accumulator::default();
        let a = MediaSummary::from_raw(&item(1, "a"), MediaType::Movie);
        let b = MediaSummary::from_raw(&item(2, "b"), MediaType::Movie);
        assert_eq!(acc.extend([a.clone(), b.clone(), a.clone()]), 2);
        assert_eq!(acc.extend([b, a]), 0);
        assert_eq!(acc.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_accumulator_ids_unique_and_ordered(
            batches in prop::collection::vec(prop::collection::vec(0u64..50, 0..20), 0..10)
        ) {
            let mut acc = Accumulator::default();
            let mut expected: Vec<u64> = Vec::new();
            for batch in &batches {
                let raw: Vec<RawItem> = batch.iter().map(|&id| item(id, "x")).collect();
                acc.extend_raw(&raw, MediaType::Tv);
                for &id in batch {
                    if !expected.contains(&id) {
                        expected.push(id);
                    }
                }
            }
            let ids: Vec<u64> = acc.items().iter().map(|i| i.id).collect();
            prop_assert_eq!(ids, expected);
        }

        #[test]
        fn prop_has_more_never_reopens(closes in prop::collection::vec(any::<bool>(), 0..20)) {
            let mut acc = Accumulator::default();
            let mut closed = false;
            for close in closes {
                if close {
                    acc.close();
                    closed = true;
                }
                acc.extend_raw(&[item(1, "x")], MediaType::Movie);
                prop_assert_eq!(acc.has_more(), !closed);
            }
        }
    }
}
