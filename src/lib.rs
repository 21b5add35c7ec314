//! Lazy, deduplicated, paginated loading of media discovery carousels.
//!
//! The crate drives the data side of a "discover" surface: rows of
//! carousels grouped by category, genre and watch provider, a featured
//! carousel, and a full-page "load more" grid. Rendering is left to the
//! caller; everything here is fetch orchestration and feed state.
//!
//! - [`tmdb`] - the metadata collaborator (HTTP client and response types)
//! - [`feed`] - per-feed state: identity, visibility gating, pagination,
//!   rate-limit classification, and the paginated grid
//! - [`session`] - the discovery session that mounts feeds per tab
//! - [`catalog`] - static category, provider and editor-pick definitions

pub mod catalog;
pub mod config;
pub mod feed;
pub mod media;
pub mod session;
pub mod tmdb;
pub mod util;
