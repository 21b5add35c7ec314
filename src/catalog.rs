//! Static definitions: preset categories, watch providers, and the
//! hand-picked editorial lists.

use crate::feed::{FeedKind, MediaGroup};
use crate::media::MediaType;

/// `(display name, list endpoint segment)`; the endpoint is `/{media}/{segment}`.
const MOVIE_CATEGORIES: &[(&str, &str)] = &[
    ("Now Playing", "now_playing"),
    ("Top Rated", "top_rated"),
    ("Most Popular", "popular"),
];

const TV_CATEGORIES: &[(&str, &str)] = &[
    ("On The Air", "on_the_air"),
    ("Top Rated", "top_rated"),
    ("Most Popular", "popular"),
];

/// `(display name, provider id)`
const MOVIE_PROVIDERS: &[(&str, &str)] = &[
    ("Netflix", "8"),
    ("Apple TV+", "2"),
    ("Amazon Prime Video", "10"),
    ("Hulu", "15"),
    ("Max", "1899"),
    ("Paramount Plus", "531"),
    ("Disney Plus", "337"),
    ("Shudder", "99"),
];

const TV_PROVIDERS: &[(&str, &str)] = &[
    ("Netflix", "8"),
    ("Apple TV+", "350"),
    ("Amazon Prime Video", "10"),
    ("Paramount Plus", "531"),
    ("Hulu", "15"),
    ("Max", "1899"),
    ("Disney Plus", "337"),
    ("fuboTV", "257"),
];

pub const EDITOR_PICKS_MOVIES: &[u64] = &[
    9342, 293, 370172, 661374, 207, 378785, 335984, 13353, 27205, 106646, 334533, 693134, 765245,
    264660, 92591, 976893, 13187, 11527, 120, 157336, 762, 666243, 545611, 329, 330459, 279,
    823219, 22, 18971, 26388, 152601,
];

pub const EDITOR_PICKS_SHOWS: &[u64] = &[
    456, 73021, 1434, 1695, 1408, 93740, 60625, 1396, 44217, 90228, 13916, 71912, 61222, 93405,
    87108, 2190, 246, 105248,
];

/// Display name shared by both editorial carousels.
pub const EDITOR_PICKS_NAME: &str = "Editor Picks";
/// Selector of the editorial feeds (and their "view more" path).
pub const EDITOR_PICKS_SELECTOR: &str = "editor-picks";

/// How many genres each tab mounts as carousels.
pub const MOVIE_GENRE_LIMIT: usize = 12;
pub const TV_GENRE_LIMIT: usize = 10;

pub fn categories(media_type: MediaType) -> Vec<MediaGroup> {
    let presets = match media_type {
        MediaType::Movie => MOVIE_CATEGORIES,
        MediaType::Tv => TV_CATEGORIES,
    };
    presets
        .iter()
        .map(|(name, segment)| MediaGroup::new(*name, FeedKind::Category, *segment, media_type))
        .collect()
}

pub fn providers(media_type: MediaType) -> Vec<MediaGroup> {
    let presets = match media_type {
        MediaType::Movie => MOVIE_PROVIDERS,
        MediaType::Tv => TV_PROVIDERS,
    };
    presets
        .iter()
        .map(|(name, id)| MediaGroup::new(*name, FeedKind::Provider, *id, media_type))
        .collect()
}

/// Looks a provider up by id within one media type's list.
pub fn provider(media_type: MediaType, id: &str) -> Option<MediaGroup> {
    providers(media_type).into_iter().find(|p| p.selector == id)
}

/// The "Editor Picks" row for one media type.
pub fn editorial(media_type: MediaType) -> MediaGroup {
    MediaGroup::new(
        EDITOR_PICKS_NAME,
        FeedKind::Editorial,
        EDITOR_PICKS_SELECTOR,
        media_type,
    )
}

pub fn genre_limit(media_type: MediaType) -> usize {
    match media_type {
        MediaType::Movie => MOVIE_GENRE_LIMIT,
        MediaType::Tv => TV_GENRE_LIMIT,
    }
}
