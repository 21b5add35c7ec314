//! Metadata collaborator: the paged list / by-id lookup service behind
//! every carousel.
//!
//! [`MetadataSource`] is the seam the loaders fetch through. [`TmdbClient`]
//! implements it over HTTP; tests substitute scripted sources.

mod types;

pub use types::{Genre, PageResponse, RawItem, UpstreamStatus};

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use types::GenreList;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Errors raised at the fetch boundary.
///
/// Loaders never propagate these upward; they are classified by
/// [`crate::feed::classify`] and folded into the feed's status.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.). Built through
    /// `From`, which strips the request URL and with it the API key.
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    /// The transport gave up waiting for a response
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code, plus the service's error body if it sent one
    #[error("HTTP error: status {status}")]
    HttpStatus {
        status: u16,
        upstream: Option<UpstreamStatus>,
    },
    /// Body was not the JSON shape we read
    #[error("Malformed response: {0}")]
    Decode(String),
    /// Response body exceeded the 5MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Failure reported by a non-HTTP source, carrying whatever status and text it had
    #[error("Upstream failure: {message}")]
    Upstream { status: Option<u16>, message: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.without_url())
    }
}

/// Ordered query parameters for one request.
///
/// Keys are the service's parameter names (`language`, `page`,
/// `with_genres`, `with_watch_providers`, `watch_region`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    pub fn new(language: &str) -> Self {
        Self::default().with("language", language)
    }

    /// Sets `key`, replacing any earlier value.
    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn page(&self) -> Option<u32> {
        self.get("page").and_then(|p| p.parse().ok())
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

/// The fetch collaborator.
///
/// Implementations are shared across concurrently running batches, so
/// they must be `Send + Sync` and hold no per-feed state.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches one page of a list endpoint.
    async fn fetch_page(&self, endpoint: &str, query: &Query) -> Result<PageResponse, FetchError>;

    /// Fetches a single record (`/movie/{id}`, `/tv/{id}`).
    async fn fetch_item(&self, path: &str, query: &Query) -> Result<RawItem, FetchError>;

    /// Fetches a genre list (`/genre/movie/list`, `/genre/tv/list`).
    async fn fetch_genres(&self, path: &str, query: &Query) -> Result<Vec<Genre>, FetchError>;
}

/// HTTP implementation of [`MetadataSource`].
///
/// No retry or backoff happens here: a failed request surfaces once and
/// the feed that issued it decides what to show. The only timeout is the
/// transport timeout configured on the underlying client.
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl TmdbClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Builds a client with its own connection pool and transport timeout.
    pub fn with_timeout(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http, base_url, api_key))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).query(query.pairs());
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.expose_secret())]);
        }

        tracing::trace!(path = %path, page = ?query.page(), "Metadata request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies are small; a failed read just means no upstream detail
            let upstream = read_limited_bytes(response, MAX_RESPONSE_SIZE)
                .await
                .ok()
                .and_then(|body| serde_json::from_slice::<UpstreamStatus>(&body).ok());
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                upstream,
            });
        }

        let body = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn fetch_page(&self, endpoint: &str, query: &Query) -> Result<PageResponse, FetchError> {
        self.get_json(endpoint, query).await
    }

    async fn fetch_item(&self, path: &str, query: &Query) -> Result<RawItem, FetchError> {
        self.get_json(path, query).await
    }

    async fn fetch_genres(&self, path: &str, query: &Query) -> Result<Vec<Genre>, FetchError> {
        let list: GenreList = self.get_json(path, query).await?;
        Ok(list.genres)
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::from)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Scripted in-memory source for unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// How a scripted request resolves.
    #[derive(Clone)]
    pub enum Reply {
        Page(PageResponse),
        Item(RawItem),
        Genres(Vec<Genre>),
        Status(u16),
        Message(String),
    }

    impl Reply {
        fn into_error(self) -> FetchError {
            match self {
                Reply::Status(status) => FetchError::HttpStatus {
                    status,
                    upstream: None,
                },
                Reply::Message(message) => FetchError::Upstream {
                    status: None,
                    message,
                },
                _ => FetchError::Decode("unexpected reply kind".into()),
            }
        }
    }

    /// Serves list pages keyed by `(endpoint, page)`, items and genre lists
    /// keyed by path, and records every request it sees.
    #[derive(Default)]
    pub struct ScriptedSource {
        replies: Mutex<HashMap<(String, u32), Reply>>,
        calls: Mutex<Vec<(String, Query)>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Scripts `total_pages` pages of `per_page` items each; ids are
        /// `page * 100 + index` so pages never overlap.
        pub fn list(self, endpoint: &str, total_pages: u32, per_page: u64) -> Self {
            for page in 1..=total_pages {
                let results = (0..per_page)
                    .map(|i| item(u64::from(page) * 100 + i, &format!("{endpoint} #{page}.{i}")))
                    .collect();
                self.reply(
                    endpoint,
                    page,
                    Reply::Page(PageResponse {
                        results,
                        page,
                        total_pages,
                    }),
                );
            }
            self
        }

        pub fn page(self, endpoint: &str, page: u32, response: PageResponse) -> Self {
            self.reply(endpoint, page, Reply::Page(response));
            self
        }

        pub fn fail(self, endpoint: &str, page: u32, reply: Reply) -> Self {
            self.reply(endpoint, page, reply);
            self
        }

        pub fn item(self, path: &str, raw: RawItem) -> Self {
            self.reply(path, 0, Reply::Item(raw));
            self
        }

        pub fn genres(self, path: &str, genres: Vec<Genre>) -> Self {
            self.reply(path, 0, Reply::Genres(genres));
            self
        }

        fn reply(&self, path: &str, page: u32, reply: Reply) {
            self.replies
                .lock()
                .unwrap()
                .insert((path.to_string(), page), reply);
        }

        fn lookup(&self, path: &str, query: &Query, page: u32) -> Option<Reply> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_string(), query.clone()));
            self.replies
                .lock()
                .unwrap()
                .get(&(path.to_string(), page))
                .cloned()
        }

        pub fn calls(&self) -> Vec<(String, Query)> {
            self.calls.lock().unwrap().clone()
        }

        /// Number of requests whose path starts with `prefix`.
        pub fn count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(path, _)| path.starts_with(prefix))
                .count()
        }

        /// Pages requested from `endpoint`, in request order.
        pub fn pages_requested(&self, endpoint: &str) -> Vec<u32> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(path, _)| path == endpoint)
                .filter_map(|(_, q)| q.page())
                .collect()
        }
    }

    pub fn item(id: u64, title: &str) -> RawItem {
        RawItem {
            id,
            title: Some(title.to_string()),
            poster_path: Some(format!("/poster{id}.jpg")),
            release_date: Some("2021-06-01".to_string()),
            ..RawItem::default()
        }
    }

    #[async_trait]
    impl MetadataSource for ScriptedSource {
        async fn fetch_page(&self, endpoint: &str, query: &Query) -> Result<PageResponse, FetchError> {
            let page = query.page().unwrap_or(1);
            match self.lookup(endpoint, query, page) {
                Some(Reply::Page(p)) => Ok(p),
                Some(other) => Err(other.into_error()),
                None => Err(FetchError::HttpStatus {
                    status: 404,
                    upstream: None,
                }),
            }
        }

        async fn fetch_item(&self, path: &str, query: &Query) -> Result<RawItem, FetchError> {
            match self.lookup(path, query, 0) {
                Some(Reply::Item(raw)) => Ok(raw),
                Some(other) => Err(other.into_error()),
                None => Err(FetchError::HttpStatus {
                    status: 404,
                    upstream: None,
                }),
            }
        }

        async fn fetch_genres(&self, path: &str, query: &Query) -> Result<Vec<Genre>, FetchError> {
            match self.lookup(path, query, 0) {
                Some(Reply::Genres(genres)) => Ok(genres),
                Some(other) => Err(other.into_error()),
                None => Ok(Vec::new()),
            }
        }
    }
}
