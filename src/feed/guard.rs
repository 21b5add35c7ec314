use crate::tmdb::FetchError;

const RATE_LIMIT_STATUS: u16 = 429;

/// Phrases that mark a failure as quota exhaustion when no status is available.
const RATE_LIMIT_PHRASES: &[&str] = &["rate limit", "too many requests"];

/// Outcome class of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Quota exhausted. The feed renders nothing at all.
    RateLimited,
    /// Anything else (5xx, malformed body, transport). The feed renders a
    /// generic failure message.
    NetworkOrUpstream,
}

/// Classifies a failed fetch. Pure and side-effect free.
///
/// A failure is [`FailureClass::RateLimited`] when it carries a 429 in the
/// HTTP status, in the service's nested status field, or when its message
/// mentions a rate-limit phrase.
pub fn classify(error: &FetchError) -> FailureClass {
    let rate_limited = match error {
        FetchError::HttpStatus { status, upstream } => {
            *status == RATE_LIMIT_STATUS
                || upstream.as_ref().is_some_and(|u| {
                    u.status_code == Some(i64::from(RATE_LIMIT_STATUS))
                        || u.status_message.as_deref().is_some_and(mentions_rate_limit)
                })
        }
        FetchError::Upstream { status, message } => {
            *status == Some(RATE_LIMIT_STATUS) || mentions_rate_limit(message)
        }
        // Transport errors carry the request URL in their text; only the status counts
        FetchError::Network(e) => e.status().is_some_and(|s| s.as_u16() == RATE_LIMIT_STATUS),
        FetchError::Timeout | FetchError::Decode(_) | FetchError::ResponseTooLarge => false,
    };

    if rate_limited {
        FailureClass::RateLimited
    } else {
        FailureClass::NetworkOrUpstream
    }
}

/// A rate-limit phrase, or "429" standing alone as a word. Digit runs such
/// as record ids ("14290") do not count.
fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p))
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "429")
}
