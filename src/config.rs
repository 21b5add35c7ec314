//! Configuration file parser for ~/.config/marquee/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted, with a warning in case they are typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{
    FetchContext, DEFAULT_EDITORIAL_BATCH_SIZE, DEFAULT_MARGIN_PX, DEFAULT_PAGE_WINDOW,
    MAX_PAGE_WINDOW,
};
use crate::session::SessionOptions;
use crate::tmdb::{MetadataSource, DEFAULT_BASE_URL};
use crate::util::{validate_base_url, UrlValidationError};

/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "TMDB_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid base_url: {0}")]
    InvalidBaseUrl(#[from] UrlValidationError),

    #[error("page_window must be between 1 and 10, got {0}")]
    InvalidPageWindow(u32),
}

/// Top-level configuration.
///
/// Every field has a default, so any subset of keys can be given.
/// `Debug` masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata service API key. `TMDB_API_KEY` takes precedence.
    pub api_key: Option<String>,

    /// API root, without trailing slash.
    pub base_url: String,

    /// Language code sent with every request (e.g. "en-US").
    pub language: String,

    /// Region used to resolve watch-provider availability.
    pub watch_region: String,

    /// Pages fetched per load cycle, 1 to 10.
    pub page_window: u32,

    /// Start loading a carousel this many pixels before it scrolls into view.
    pub visibility_margin_px: i64,

    /// Ids per by-id sub-batch for editorial lists.
    pub editorial_batch_size: usize,

    pub movie_genre_limit: usize,
    pub tv_genre_limit: usize,

    /// Ids behind the editor-picks rows and their "view more" grids.
    pub editor_picks_movies: Vec<u64>,
    pub editor_picks_shows: Vec<u64>,

    /// Transport timeout per request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            language: "en-US".to_string(),
            watch_region: "US".to_string(),
            page_window: DEFAULT_PAGE_WINDOW,
            visibility_margin_px: DEFAULT_MARGIN_PX,
            editorial_batch_size: DEFAULT_EDITORIAL_BATCH_SIZE,
            movie_genre_limit: crate::catalog::MOVIE_GENRE_LIMIT,
            tv_genre_limit: crate::catalog::TV_GENRE_LIMIT,
            editor_picks_movies: crate::catalog::EDITOR_PICKS_MOVIES.to_vec(),
            editor_picks_shows: crate::catalog::EDITOR_PICKS_SHOWS.to_vec(),
            request_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("language", &self.language)
            .field("watch_region", &self.watch_region)
            .field("page_window", &self.page_window)
            .field("visibility_margin_px", &self.visibility_margin_px)
            .field("editorial_batch_size", &self.editorial_batch_size)
            .field("movie_genre_limit", &self.movie_genre_limit)
            .field("tv_genre_limit", &self.tv_genre_limit)
            .field("editor_picks_movies", &self.editor_picks_movies)
            .field("editor_picks_shows", &self.editor_picks_shows)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

const KNOWN_KEYS: &[&str] = &[
    "api_key",
    "base_url",
    "language",
    "watch_region",
    "page_window",
    "visibility_margin_px",
    "editorial_batch_size",
    "movie_genre_limit",
    "tv_genre_limit",
    "editor_picks_movies",
    "editor_picks_shows",
    "request_timeout_secs",
];

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or blank file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Non-HTTPS remote `base_url` → `Err(ConfigError::InvalidBaseUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        Self::parse(&content)
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(
            base_url = %config.base_url,
            language = %config.language,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.base_url)?;
        if !(1..=MAX_PAGE_WINDOW).contains(&self.page_window) {
            return Err(ConfigError::InvalidPageWindow(self.page_window));
        }
        Ok(())
    }

    /// API key from the environment, falling back to the file.
    pub fn api_key(&self) -> Option<SecretString> {
        let from_env = std::env::var(API_KEY_ENV).ok();
        Self::pick_api_key(from_env, self.api_key.clone())
    }

    fn pick_api_key(from_env: Option<String>, from_file: Option<String>) -> Option<SecretString> {
        from_env
            .filter(|k| !k.trim().is_empty())
            .or(from_file.filter(|k| !k.trim().is_empty()))
            .map(|k| SecretString::from(k.trim().to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Fetch inputs shared by every feed.
    pub fn fetch_context(&self, source: Arc<dyn MetadataSource>) -> FetchContext {
        FetchContext::new(source, &self.language, &self.watch_region)
            .with_page_window(self.page_window)
            .with_editorial_batch_size(self.editorial_batch_size)
            .with_editor_picks(self.editor_picks_movies.clone(), self.editor_picks_shows.clone())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            margin_px: self.visibility_margin_px,
            movie_genre_limit: self.movie_genre_limit,
            tv_genre_limit: self.tv_genre_limit,
            ..SessionOptions::default()
        }
    }
}
