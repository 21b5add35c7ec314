use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors validating the metadata service base URL.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to anything but the local machine.
    #[error("Insecure URL: {0} must use https")]
    Insecure(String),
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the API base URL.
///
/// HTTPS is required so the API key never crosses the network in clear
/// text; plain HTTP is accepted only for loopback hosts (local proxies and
/// test servers).
///
/// ```
/// use marquee::util::validate_base_url;
///
/// assert!(validate_base_url("https://api.themoviedb.org/3").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
/// assert!(validate_base_url("http://api.themoviedb.org/3").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(host) => Ok(url),
        "http" => Err(UrlValidationError::Insecure(host.to_string())),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_string())),
    }
}

fn is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_loopback())
}
