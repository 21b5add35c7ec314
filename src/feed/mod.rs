//! Per-feed loading: identity, visibility gating, pagination and failure
//! classification.
//!
//! A *feed* is one list of media shown as a carousel or a grid. Feeds are
//! keyed by [`FeedIdentity`], start loading when a [`VisibilityGate`] first
//! opens, and fetch pages in fixed windows.
//!
//! # Architecture
//!
//! - [`FeedIdentity`] - identity, anchors and "view more" paths
//! - [`FeedLoader`] - the single-feed state machine
//! - [`PaginatedGrid`] - the full-page grid behind "view more"
//! - [`classify`] - rate-limit detection for failed fetches
//!
//! Fetches never run on the owner's task. Each batch is spawned and reports
//! back over an `mpsc` channel, and the owner applies the report on its
//! own schedule. That keeps every piece of feed state single-owner.

mod curated;
mod grid;
mod guard;
mod identity;
mod loader;
mod pagination;
mod visibility;

use std::sync::Arc;

pub use curated::{fetch_curated, CuratedOutcome, DEFAULT_EDITORIAL_BATCH_SIZE};
pub use grid::{GridMode, PaginatedGrid};
pub use guard::{classify, FailureClass};
pub use identity::{anchor_id, resolve, slug, FeedIdentity, FeedKind, MediaGroup, NavError};
pub use loader::{
    BatchReport, FeedLoader, FeedState, FeedStatus, LoaderId, Presentation, CAROUSEL_LIMIT,
};
pub use pagination::{
    fetch_window, Accumulator, BatchOutcome, PageWindow, DEFAULT_PAGE_WINDOW, MAX_PAGE_WINDOW,
};
pub use visibility::{Observation, Viewport, VisibilityGate, DEFAULT_MARGIN_PX};

use crate::media::MediaType;
use crate::tmdb::MetadataSource;

/// Shared inputs for every fetch a feed issues.
#[derive(Clone)]
pub struct FetchContext {
    pub source: Arc<dyn MetadataSource>,
    pub language: String,
    /// Region for watch-provider availability.
    pub region: String,
    pub page_window: u32,
    pub editorial_batch_size: usize,
    /// Curated id lists behind the editor-picks rows and grids.
    pub editor_picks_movies: Vec<u64>,
    pub editor_picks_shows: Vec<u64>,
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("language", &self.language)
            .field("region", &self.region)
            .field("page_window", &self.page_window)
            .field("editorial_batch_size", &self.editorial_batch_size)
            .field("editor_picks_movies", &self.editor_picks_movies.len())
            .field("editor_picks_shows", &self.editor_picks_shows.len())
            .finish_non_exhaustive()
    }
}

impl FetchContext {
    pub fn new(source: Arc<dyn MetadataSource>, language: &str, region: &str) -> Self {
        Self {
            source,
            language: language.to_string(),
            region: region.to_string(),
            page_window: DEFAULT_PAGE_WINDOW,
            editorial_batch_size: DEFAULT_EDITORIAL_BATCH_SIZE,
            editor_picks_movies: crate::catalog::EDITOR_PICKS_MOVIES.to_vec(),
            editor_picks_shows: crate::catalog::EDITOR_PICKS_SHOWS.to_vec(),
        }
    }

    pub fn with_page_window(mut self, pages: u32) -> Self {
        self.page_window = pages.clamp(1, MAX_PAGE_WINDOW);
        self
    }

    pub fn with_editorial_batch_size(mut self, size: usize) -> Self {
        self.editorial_batch_size = size.max(1);
        self
    }

    pub fn with_editor_picks(mut self, movies: Vec<u64>, shows: Vec<u64>) -> Self {
        self.editor_picks_movies = movies;
        self.editor_picks_shows = shows;
        self
    }

    pub fn editor_picks(&self, media_type: MediaType) -> &[u64] {
        match media_type {
            MediaType::Movie => &self.editor_picks_movies,
            MediaType::Tv => &self.editor_picks_shows,
        }
    }
}
