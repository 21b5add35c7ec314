//! Full-page "view more" grid.
//!
//! Unlike carousels the grid is not visibility gated: it loads its first
//! window on request and then only on an explicit load-more. It owns its
//! own result channel, so dropping the grid discards anything still in
//! flight.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::curated::{fetch_curated, CuratedOutcome};
use super::identity::{FeedIdentity, FeedKind, NavError};
use super::loader::{BatchReport, FeedLoader, FeedState, FeedStatus, LoaderId, Presentation};
use super::FetchContext;
use crate::media::MediaSummary;

/// How a grid gets its data. Fixed for the lifetime of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    /// Fixed id list, fetched once by id. Never has more pages.
    Editorial,
    /// Generic discover endpoint constrained by a genre or provider id.
    Filtered,
    /// Named preset list endpoint.
    Categorical,
}

impl GridMode {
    pub fn of(identity: &FeedIdentity) -> Self {
        match identity.kind() {
            FeedKind::Editorial => GridMode::Editorial,
            FeedKind::Genre | FeedKind::Provider => GridMode::Filtered,
            FeedKind::Category => GridMode::Categorical,
        }
    }
}

#[derive(Debug)]
enum GridEvent {
    Batch(BatchReport),
    Curated(CuratedOutcome),
}

impl From<BatchReport> for GridEvent {
    fn from(report: BatchReport) -> Self {
        GridEvent::Batch(report)
    }
}

const GRID_LOADER: LoaderId = LoaderId(0);

pub struct PaginatedGrid {
    mode: GridMode,
    ctx: FetchContext,
    loader: FeedLoader,
    curated_in_flight: bool,
    tx: mpsc::Sender<GridEvent>,
    rx: mpsc::Receiver<GridEvent>,
}

impl std::fmt::Debug for PaginatedGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedGrid")
            .field("mode", &self.mode)
            .field("feed", &self.loader.identity().to_string())
            .field("status", &self.status())
            .field("items", &self.items().len())
            .finish()
    }
}

impl PaginatedGrid {
    pub fn open(identity: FeedIdentity, ctx: FetchContext) -> Self {
        let mode = GridMode::of(&identity);
        let (tx, rx) = mpsc::channel(4);
        let loader = FeedLoader::new(GRID_LOADER, identity, ctx.page_window);
        tracing::debug!(feed = %loader.identity(), mode = ?mode, "Opened grid");
        Self {
            mode,
            ctx,
            loader,
            curated_in_flight: false,
            tx,
            rx,
        }
    }

    /// Opens the grid a "view more" path points at.
    pub fn open_path(path: &str, ctx: FetchContext) -> Result<Self, NavError> {
        Ok(Self::open(FeedIdentity::from_more_path(path)?, ctx))
    }

    pub fn mode(&self) -> GridMode {
        self.mode
    }

    pub fn identity(&self) -> &FeedIdentity {
        self.loader.identity()
    }

    pub fn state(&self) -> &FeedState {
        self.loader.state()
    }

    pub fn items(&self) -> &[MediaSummary] {
        self.loader.state().items()
    }

    pub fn status(&self) -> FeedStatus {
        if self.curated_in_flight {
            FeedStatus::Loading
        } else {
            self.loader.state().status()
        }
    }

    /// What the grid page draws. Same policy as a carousel, without the
    /// item cap.
    pub fn presentation(&self) -> Presentation<'_> {
        if self.curated_in_flight {
            return Presentation::Placeholder;
        }
        self.loader.presentation_capped(usize::MAX)
    }

    pub fn has_more(&self) -> bool {
        self.mode != GridMode::Editorial && self.loader.state().has_more()
    }

    /// Whether a load-more would be accepted right now.
    pub fn can_load_more(&self) -> bool {
        self.has_more() && self.status() == FeedStatus::Ready
    }

    /// Starts the first window (or the whole id list for editorial grids).
    /// Returns `false` if the grid has already started.
    pub fn load_initial(&mut self) -> bool {
        match self.mode {
            GridMode::Editorial => self.start_curated(),
            GridMode::Filtered | GridMode::Categorical => self.loader.start(&self.ctx, &self.tx),
        }
    }

    /// Starts the next window. Ignored while a window is outstanding, after
    /// the last page, after a failure, and always for editorial grids.
    pub fn load_more(&mut self) -> bool {
        if self.mode == GridMode::Editorial {
            return false;
        }
        self.loader.load_more(&self.ctx, &self.tx)
    }

    fn start_curated(&mut self) -> bool {
        if self.curated_in_flight || self.loader.state().status() != FeedStatus::Idle {
            return false;
        }
        let media_type = self.loader.identity().media_type();
        let ids = self.ctx.editor_picks(media_type).to_vec();
        let query = crate::tmdb::Query::new(&self.ctx.language);
        let batch_size = self.ctx.editorial_batch_size;
        let source = Arc::clone(&self.ctx.source);
        let tx = self.tx.clone();

        self.curated_in_flight = true;
        tracing::debug!(media = %media_type, picks = ids.len(), "Fetching editorial grid");
        tokio::spawn(async move {
            let outcome = fetch_curated(source.as_ref(), media_type, &ids, batch_size, &query).await;
            if tx.send(GridEvent::Curated(outcome)).await.is_err() {
                tracing::debug!("Grid closed, dropping editorial results");
            }
        });
        true
    }

    fn apply(&mut self, event: GridEvent) {
        match event {
            GridEvent::Batch(report) => self.loader.apply(report),
            GridEvent::Curated(outcome) => {
                self.curated_in_flight = false;
                let identity = self.loader.identity().clone();
                self.loader = match outcome.failure_class() {
                    Some(class) => {
                        let message = outcome
                            .failures
                            .first()
                            .map(ToString::to_string)
                            .unwrap_or_default();
                        tracing::debug!(feed = %identity, class = ?class, "Editorial grid failed");
                        FeedLoader::failed(GRID_LOADER, identity, class, message)
                    }
                    None => FeedLoader::preloaded(GRID_LOADER, identity, outcome.items),
                };
            }
        }
    }

    /// Applies every result that has already arrived without waiting.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Waits for the outstanding load, if any, and applies it.
    pub async fn settle(&mut self) {
        while self.status() == FeedStatus::Loading {
            match self.rx.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }
}
