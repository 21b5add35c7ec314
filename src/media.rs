//! Normalised media records shown in carousels and grids.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tmdb::RawItem;

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
/// Size token for carousel and grid posters.
pub const POSTER_SIZE: &str = "w342";
/// Size token for featured backdrops.
pub const BACKDROP_SIZE: &str = "original";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    /// Path segment used by the service and by anchors/slugs.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Tv),
            _ => None,
        }
    }

    /// Detail path for a single record, e.g. `/tv/1396`.
    pub fn item_path(self, id: u64) -> String {
        format!("/{}/{}", self.as_str(), id)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A display-ready movie or show.
///
/// Built once from an upstream record and never patched; later pages add
/// new summaries rather than updating existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSummary {
    pub id: u64,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub year: Option<i32>,
    pub media_type: MediaType,
}

impl MediaSummary {
    pub fn from_raw(raw: &RawItem, media_type: MediaType) -> Self {
        let title = raw
            .title
            .as_deref()
            .or(raw.name.as_deref())
            .unwrap_or_default()
            .to_string();
        let date = match media_type {
            MediaType::Movie => raw.release_date.as_deref(),
            MediaType::Tv => raw.first_air_date.as_deref(),
        };
        Self {
            id: raw.id,
            title,
            poster_path: raw.poster_path.clone().filter(|p| !p.is_empty()),
            backdrop_path: raw.backdrop_path.clone().filter(|p| !p.is_empty()),
            overview: raw.overview.clone().filter(|o| !o.is_empty()),
            year: date.and_then(parse_year),
            media_type,
        }
    }

    pub fn poster_url(&self) -> Option<String> {
        self.poster_path
            .as_deref()
            .map(|p| image_url(POSTER_SIZE, p))
    }

    pub fn backdrop_url(&self) -> Option<String> {
        self.backdrop_path
            .as_deref()
            .map(|p| image_url(BACKDROP_SIZE, p))
    }
}

/// CDN URL for an image path returned by the service.
pub fn image_url(size: &str, path: &str) -> String {
    format!("{IMAGE_BASE_URL}/{size}{path}")
}

/// Year of a `YYYY-MM-DD` date. Bare or partial dates fall back to the
/// leading year component.
fn parse_year(date: &str) -> Option<i32> {
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return Some(parsed.year());
    }
    date.split('-').next()?.parse().ok()
}
