//! Single-feed loading state machine.
//!
//! ```text
//! Idle ──gate opens / start──> Loading ──batch ok──> Ready ──load_more──> Loading
//!                                  │
//!                                  └──batch failed──> Error | RateLimited
//! ```
//!
//! Preloaded feeds are born `Ready` and never fetch. A feed never goes back
//! to `Idle`, and only an explicit load-more takes `Ready` back to
//! `Loading`.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::guard::{classify, FailureClass};
use super::identity::FeedIdentity;
use super::pagination::{fetch_window, Accumulator, BatchOutcome, PageWindow};
use super::visibility::VisibilityGate;
use super::FetchContext;
use crate::media::MediaSummary;

/// Maximum items a carousel shows.
pub const CAROUSEL_LIMIT: usize = 20;

/// Handle of one mounted loader. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(pub u64);

impl std::fmt::Display for LoaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Ready,
    Error,
    RateLimited,
}

impl From<FailureClass> for FeedStatus {
    fn from(class: FailureClass) -> Self {
        match class {
            FailureClass::RateLimited => FeedStatus::RateLimited,
            FailureClass::NetworkOrUpstream => FeedStatus::Error,
        }
    }
}

/// What a carousel should draw for its feed.
#[derive(Debug, PartialEq, Eq)]
pub enum Presentation<'a> {
    /// Not loaded yet: draw a skeleton row.
    Placeholder,
    /// Up to [`CAROUSEL_LIMIT`] items. May be empty.
    Items(&'a [MediaSummary]),
    /// Generic failure message.
    Failed,
    /// Draw nothing at all.
    Hidden,
}

/// A finished batch on its way back to the loader that issued it.
#[derive(Debug)]
pub struct BatchReport {
    pub loader: LoaderId,
    pub window: PageWindow,
    pub outcome: BatchOutcome,
}

/// Everything known about one feed.
#[derive(Debug, Clone)]
pub struct FeedState {
    identity: FeedIdentity,
    acc: Accumulator,
    /// Next page to request.
    page: u32,
    total_pages: Option<u32>,
    status: FeedStatus,
    last_error: Option<String>,
}

impl FeedState {
    fn new(identity: FeedIdentity) -> Self {
        Self {
            identity,
            acc: Accumulator::default(),
            page: 1,
            total_pages: None,
            status: FeedStatus::Idle,
            last_error: None,
        }
    }

    pub fn identity(&self) -> &FeedIdentity {
        &self.identity
    }

    pub fn items(&self) -> &[MediaSummary] {
        self.acc.items()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn has_more(&self) -> bool {
        self.acc.has_more()
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == FeedStatus::Loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Owns one feed's state and issues its batches.
///
/// Batches run as spawned tasks and report back over the owner's channel;
/// the owner routes each [`BatchReport`] to [`FeedLoader::apply`]. The
/// loader never has more than one batch in flight.
#[derive(Debug)]
pub struct FeedLoader {
    id: LoaderId,
    state: FeedState,
    window: u32,
    preloaded: bool,
    gate: Option<VisibilityGate>,
    batches_issued: u32,
}

impl FeedLoader {
    pub fn new(id: LoaderId, identity: FeedIdentity, window: u32) -> Self {
        Self {
            id,
            state: FeedState::new(identity),
            window: window.max(1),
            preloaded: false,
            gate: None,
            batches_issued: 0,
        }
    }

    /// A loader whose items were supplied by its owner. Starts `Ready`,
    /// has no further pages and never fetches.
    pub fn preloaded(id: LoaderId, identity: FeedIdentity, items: Vec<MediaSummary>) -> Self {
        let mut loader = Self::new(id, identity, 1);
        loader.state.acc = Accumulator::complete(items);
        loader.state.status = FeedStatus::Ready;
        loader.preloaded = true;
        loader
    }

    /// A preloaded loader whose supply failed outright.
    pub fn failed(id: LoaderId, identity: FeedIdentity, class: FailureClass, message: String) -> Self {
        let mut loader = Self::preloaded(id, identity, Vec::new());
        loader.state.status = class.into();
        loader.state.last_error = Some(message);
        loader
    }

    /// Defers the first batch until the gate opens.
    pub fn with_gate(mut self, gate: VisibilityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn id(&self) -> LoaderId {
        self.id
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn identity(&self) -> &FeedIdentity {
        &self.state.identity
    }

    pub fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    pub fn is_gated(&self) -> bool {
        self.gate.is_some()
    }

    /// Number of batches this loader has started.
    pub fn batches_issued(&self) -> u32 {
        self.batches_issued
    }

    /// Checks the visibility gate and starts the first batch the first time
    /// it reports the anchor in range. Later openings do nothing.
    pub fn poll_gate<E>(&mut self, ctx: &FetchContext, tx: &mpsc::Sender<E>) -> bool
    where
        E: From<BatchReport> + Send + 'static,
    {
        let opened = self.gate.as_mut().is_some_and(VisibilityGate::poll_opened);
        if !opened {
            return false;
        }
        tracing::debug!(feed = %self.state.identity, "Carousel came into range");
        self.start(ctx, tx)
    }

    /// Starts the first batch. Only an `Idle`, non-preloaded loader starts;
    /// any other call is a no-op.
    pub fn start<E>(&mut self, ctx: &FetchContext, tx: &mpsc::Sender<E>) -> bool
    where
        E: From<BatchReport> + Send + 'static,
    {
        if self.preloaded || self.state.status != FeedStatus::Idle {
            return false;
        }
        self.spawn_batch(ctx, tx)
    }

    /// Starts the next batch. Only allowed from `Ready` while more pages
    /// exist.
    pub fn load_more<E>(&mut self, ctx: &FetchContext, tx: &mpsc::Sender<E>) -> bool
    where
        E: From<BatchReport> + Send + 'static,
    {
        if self.preloaded || self.state.status != FeedStatus::Ready || !self.state.has_more() {
            return false;
        }
        self.spawn_batch(ctx, tx)
    }

    fn spawn_batch<E>(&mut self, ctx: &FetchContext, tx: &mpsc::Sender<E>) -> bool
    where
        E: From<BatchReport> + Send + 'static,
    {
        let Some(endpoint) = self.state.identity.endpoint() else {
            tracing::warn!(feed = %self.state.identity, "Feed has no list endpoint, not fetching");
            return false;
        };

        let window = PageWindow::new(self.state.page, self.window);
        let query = self.state.identity.query(&ctx.language, &ctx.region);
        let known_total = self.state.total_pages;
        let source = Arc::clone(&ctx.source);
        let tx = tx.clone();
        let id = self.id;

        self.state.status = FeedStatus::Loading;
        self.batches_issued += 1;
        tracing::debug!(
            feed = %self.state.identity,
            start = window.start,
            size = window.size,
            "Fetching batch"
        );

        tokio::spawn(async move {
            let outcome = fetch_window(source.as_ref(), &endpoint, &query, window, known_total).await;
            let report = BatchReport {
                loader: id,
                window,
                outcome,
            };
            if tx.send(report.into()).await.is_err() {
                tracing::debug!(loader = %id, "Feed owner gone, dropping batch");
            }
        });
        true
    }

    /// Merges a finished batch.
    ///
    /// Items are appended with duplicates dropped, the page cursor moves
    /// past the last merged page, and a failure is classified into the
    /// status. Items merged before a failure are kept.
    pub fn apply(&mut self, report: BatchReport) {
        if self.state.status != FeedStatus::Loading {
            tracing::debug!(feed = %self.state.identity, "Ignoring batch for idle feed");
            return;
        }

        let BatchOutcome {
            items,
            last_page,
            total_pages,
            exhausted,
            failure,
            ..
        } = report.outcome;

        let media_type = self.state.identity.media_type();
        let added = self.state.acc.extend_raw(&items, media_type);
        if let Some(last) = last_page {
            self.state.page = self.state.page.max(last + 1);
        }
        if total_pages.is_some() {
            self.state.total_pages = total_pages;
        }
        if exhausted {
            self.state.acc.close();
        }

        match failure {
            None => {
                self.state.status = FeedStatus::Ready;
                self.state.last_error = None;
                tracing::debug!(
                    feed = %self.state.identity,
                    added,
                    total = self.state.acc.len(),
                    has_more = self.state.has_more(),
                    "Batch merged"
                );
            }
            Some(e) => {
                let class = classify(&e);
                self.state.status = class.into();
                match class {
                    FailureClass::RateLimited => {
                        tracing::debug!(feed = %self.state.identity, error = %e, "Rate limited")
                    }
                    FailureClass::NetworkOrUpstream => {
                        tracing::warn!(feed = %self.state.identity, error = %e, "Failed to load feed")
                    }
                }
                self.state.last_error = Some(e.to_string());
            }
        }
    }

    /// What a carousel draws for this feed.
    ///
    /// An errored feed that merged items before failing still shows them.
    pub fn presentation(&self) -> Presentation<'_> {
        self.presentation_capped(CAROUSEL_LIMIT)
    }

    /// Same policy as [`presentation`](Self::presentation) with at most
    /// `limit` items.
    pub fn presentation_capped(&self, limit: usize) -> Presentation<'_> {
        let items = self.state.items();
        match self.state.status {
            FeedStatus::RateLimited => Presentation::Hidden,
            FeedStatus::Error if items.is_empty() => Presentation::Failed,
            FeedStatus::Idle | FeedStatus::Loading if items.is_empty() => Presentation::Placeholder,
            _ => Presentation::Items(&items[..items.len().min(limit)]),
        }
    }
}
