use std::fmt;
use std::str::FromStr;

use crate::catalog;
use crate::feed::DEFAULT_MARGIN_PX;
use crate::media::MediaType;

/// Top-level discover tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Movies,
    TvShows,
    EditorPicks,
}

impl Tab {
    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Movies => "movies",
            Tab::TvShows => "tvshows",
            Tab::EditorPicks => "editorpicks",
        }
    }

    /// Media type of the tab's paged feeds; `None` for the mixed editorial tab.
    pub fn media_type(self) -> Option<MediaType> {
        match self {
            Tab::Movies => Some(MediaType::Movie),
            Tab::TvShows => Some(MediaType::Tv),
            Tab::EditorPicks => None,
        }
    }

    /// Media type whose anchors "jump to category" targets on this tab.
    pub fn anchor_media_type(self) -> MediaType {
        match self {
            Tab::TvShows => MediaType::Tv,
            Tab::Movies | Tab::EditorPicks => MediaType::Movie,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movies" | "movie" => Ok(Tab::Movies),
            "tvshows" | "tv" | "shows" => Ok(Tab::TvShows),
            "editorpicks" | "editor-picks" | "picks" => Ok(Tab::EditorPicks),
            other => Err(format!("unknown tab '{other}' (movies, tvshows, editorpicks)")),
        }
    }
}

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Proximity margin for visibility gates.
    pub margin_px: i64,
    /// Height each carousel row occupies in the layout.
    pub row_height: i64,
    pub movie_genre_limit: usize,
    pub tv_genre_limit: usize,
    /// Seed for the shuffle/random-pick generator. Entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            margin_px: DEFAULT_MARGIN_PX,
            row_height: 300,
            movie_genre_limit: catalog::MOVIE_GENRE_LIMIT,
            tv_genre_limit: catalog::TV_GENRE_LIMIT,
            seed: None,
        }
    }
}

impl SessionOptions {
    pub fn genre_limit(&self, media_type: MediaType) -> usize {
        match media_type {
            MediaType::Movie => self.movie_genre_limit,
            MediaType::Tv => self.tv_genre_limit,
        }
    }
}
