use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::media::MediaType;
use crate::tmdb::{Genre, Query};

const MORE_PREFIX: &str = "/discover/more/";

/// What a feed is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedKind {
    /// Named preset list endpoint (now playing, top rated, ...)
    Category,
    /// Generic discover endpoint filtered by genre id
    Genre,
    /// Generic discover endpoint filtered by watch provider
    Provider,
    /// Fixed hand-picked id list
    Editorial,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Category => "category",
            FeedKind::Genre => "genre",
            FeedKind::Provider => "provider",
            FeedKind::Editorial => "editorial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "category" => Some(FeedKind::Category),
            "genre" => Some(FeedKind::Genre),
            "provider" => Some(FeedKind::Provider),
            "editorial" => Some(FeedKind::Editorial),
            _ => None,
        }
    }
}

/// Static definition of a category, genre or provider row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGroup {
    pub name: String,
    pub kind: FeedKind,
    /// Endpoint segment for categories, numeric id for genres and providers.
    pub selector: String,
    pub media_type: MediaType,
}

impl MediaGroup {
    pub fn new(
        name: impl Into<String>,
        kind: FeedKind,
        selector: impl Into<String>,
        media_type: MediaType,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            selector: selector.into(),
            media_type,
        }
    }

    pub fn genre(genre: &Genre, media_type: MediaType) -> Self {
        Self::new(&genre.name, FeedKind::Genre, genre.id.to_string(), media_type)
    }

    pub fn identity(&self) -> FeedIdentity {
        resolve(self, self.media_type)
    }

    /// List endpoint this group is fetched from (empty for editorial groups).
    pub fn endpoint(&self) -> String {
        self.identity().endpoint().unwrap_or_default()
    }

    /// Anchor the group's carousel is addressable by.
    pub fn anchor(&self) -> String {
        anchor_id(&self.name, self.media_type)
    }
}

/// Stable identity of one feed.
///
/// Two identities are equal exactly when they fetch the same data, so the
/// identity doubles as the dedup key for mounted feeds. Fields are private;
/// an identity never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedIdentity {
    kind: FeedKind,
    media_type: MediaType,
    selector: Arc<str>,
}

impl FeedIdentity {
    pub fn new(kind: FeedKind, media_type: MediaType, selector: &str) -> Self {
        let selector = match kind {
            // Accept either "now_playing" or a full "/movie/now_playing" endpoint
            FeedKind::Category => selector.trim().trim_end_matches('/').rsplit('/').next().unwrap_or(""),
            _ => selector.trim(),
        };
        Self {
            kind,
            media_type,
            selector: Arc::from(selector),
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// List endpoint for paged feeds; `None` for editorial feeds, which are
    /// resolved by id.
    pub fn endpoint(&self) -> Option<String> {
        match self.kind {
            FeedKind::Category => Some(format!("/{}/{}", self.media_type, self.selector)),
            FeedKind::Genre | FeedKind::Provider => Some(format!("/discover/{}", self.media_type)),
            FeedKind::Editorial => None,
        }
    }

    /// Base query (without `page`) for this feed.
    pub fn query(&self, language: &str, region: &str) -> Query {
        let query = Query::new(language);
        match self.kind {
            FeedKind::Genre => query.with("with_genres", &*self.selector),
            FeedKind::Provider => query
                .with("with_watch_providers", &*self.selector)
                .with("watch_region", region),
            FeedKind::Category | FeedKind::Editorial => query,
        }
    }

    /// Router path of this feed's "view more" page.
    pub fn more_path(&self) -> String {
        format!(
            "{MORE_PREFIX}{}/{}/{}",
            self.kind.as_str(),
            self.selector,
            self.media_type
        )
    }

    /// Parses a path produced by [`FeedIdentity::more_path`].
    pub fn from_more_path(path: &str) -> Result<Self, NavError> {
        let rest = path
            .strip_prefix(MORE_PREFIX)
            .ok_or_else(|| NavError::NotAMorePath(path.to_string()))?;
        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        let [kind, selector, media] = parts.as_slice() else {
            return Err(NavError::Malformed(path.to_string()));
        };

        let kind = FeedKind::parse(kind).ok_or_else(|| NavError::UnknownKind(kind.to_string()))?;
        let media_type =
            MediaType::parse(media).ok_or_else(|| NavError::UnknownMediaType(media.to_string()))?;
        let selector_ok = !selector.is_empty()
            && selector
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !selector_ok {
            return Err(NavError::InvalidSelector(selector.to_string()));
        }

        Ok(Self::new(kind, media_type, selector))
    }
}

impl fmt::Display for FeedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.media_type, self.selector)
    }
}

/// Errors parsing a "view more" path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("not a discover path: {0}")]
    NotAMorePath(String),
    #[error("expected /discover/more/<kind>/<selector>/<media>, got {0}")]
    Malformed(String),
    #[error("unknown feed kind: {0}")]
    UnknownKind(String),
    #[error("unknown media type: {0}")]
    UnknownMediaType(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// Derives the identity of a group's feed. Pure: equal inputs always give
/// equal identities.
pub fn resolve(group: &MediaGroup, media_type: MediaType) -> FeedIdentity {
    FeedIdentity::new(group.kind, media_type, &group.selector)
}

/// URL-safe slug of a display name: lower-cased, with every run of
/// non-alphanumeric characters collapsed to one hyphen.
///
/// Distinct names can collide ("Now Playing" and "Now   Playing!" both
/// give `now-playing`); callers get whichever anchor was registered.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// Anchor id of a carousel: `carousel-{slug}-{movie|tv}`.
pub fn anchor_id(name: &str, media_type: MediaType) -> String {
    format!("carousel-{}-{}", slug(name), media_type)
}
