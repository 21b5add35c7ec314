use serde::Deserialize;

/// A movie or show record as returned by list and detail endpoints.
///
/// Only the fields the discovery surface reads are modelled; everything
/// else in the upstream JSON is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawItem {
    pub id: u64,
    /// Movie title (absent for shows).
    pub title: Option<String>,
    /// Show name (absent for movies).
    pub name: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
}

/// One page of a list endpoint (`/movie/popular`, `/discover/tv`, ...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageResponse {
    pub results: Vec<RawItem>,
    /// Page number as reported by the service (0 when omitted).
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GenreList {
    pub genres: Vec<Genre>,
}

/// Error body attached to non-2xx responses.
///
/// The service reports its own code next to the HTTP status, e.g.
/// `{"status_code": 25, "status_message": "Your request count (41) is over the allowed limit of (40)."}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpstreamStatus {
    pub status_code: Option<i64>,
    pub status_message: Option<String>,
}
