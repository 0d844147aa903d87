//! Catalog source adapters
//!
//! Each adapter wraps one external search API behind [`ArtworkSource`]:
//! it chooses the query from the request's populated fields, talks HTTP, and
//! maps the raw response into [`ArtworkCandidate`]s. Adapters never retry;
//! that is the controller's job.

pub mod catalog_a;
pub mod catalog_b;

pub use catalog_a::{CatalogAClient, CatalogACredentials, CatalogASettings};
pub use catalog_b::{CatalogBClient, CatalogBSettings};

use crate::error::SourceError;
use crate::matching;
use crate::model::{ArtworkCandidate, LookupRequest, QueryKind, Relevance, SourceId};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

/// Longest response excerpt quoted in an error message
const BODY_EXCERPT_CHARS: usize = 160;

/// Uniform capability interface over one external catalog
#[async_trait::async_trait]
pub trait ArtworkSource: Send + Sync {
    /// Which catalog this adapter talks to
    fn id(&self) -> SourceId;

    /// Whether this source can serve the query kind at all
    fn supports(&self, _kind: QueryKind) -> bool {
        true
    }

    /// Search for artwork candidates matching `request`.
    ///
    /// Must return `SourceErrorKind::Unsupported` without any network call
    /// when `supports(request.query_kind())` is false.
    async fn search(&self, request: &LookupRequest) -> Result<Vec<ArtworkCandidate>, SourceError>;
}

/// One size variant of an image as reported by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl ImageVariant {
    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Largest variant by area; the first listed wins ties
pub fn pick_largest(variants: &[ImageVariant]) -> Option<&ImageVariant> {
    variants.iter().fold(None, |best: Option<&ImageVariant>, variant| match best {
        Some(current) if current.area() >= variant.area() => Some(current),
        _ => Some(variant),
    })
}

/// Push candidates whose album fails the request's album filter to the back.
///
/// Candidates without an album name are left alone.
pub fn apply_album_filter(candidates: &mut [ArtworkCandidate], album: &str) {
    for candidate in candidates.iter_mut() {
        if let Some(name) = &candidate.album_name {
            if !matching::fuzzy_matches(album, name) {
                candidate.relevance = Relevance::Deprioritized;
            }
        }
    }
}

/// Title relevance, capped at `Weak` when the credited artists do not match
pub(crate) fn score(
    request: &LookupRequest,
    target_title: &str,
    title: &str,
    artists: &[&str],
) -> Relevance {
    let relevance = matching::relevance(target_title, title);
    if matching::artist_matches(request.artist_name(), artists.iter().copied()) {
        relevance
    } else {
        relevance.min(Relevance::Weak)
    }
}

/// Build the shared HTTP client for an adapter
pub(crate) fn build_http_client(
    connect_timeout: Duration,
) -> Result<reqwest::Client, maf_common::Error> {
    reqwest::Client::builder()
        .user_agent(maf_common::config::get_user_agent())
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| maf_common::Error::Internal(format!("HTTP client build failed: {}", e)))
}

/// `Retry-After` in seconds, when present and numeric
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{}...", cut)
    }
}

/// Map a non-success HTTP status into the error taxonomy
pub(crate) fn error_for_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> SourceError {
    let code = status.as_u16();
    let message = if body.trim().is_empty() {
        format!("HTTP {}", code)
    } else {
        format!("HTTP {}: {}", code, excerpt(body))
    };

    match code {
        429 => SourceError::rate_limited(retry_after, message),
        500..=599 => SourceError::server_error(code, message),
        400..=499 => SourceError::client_error(code, message),
        _ => SourceError {
            http_status: Some(code),
            ..SourceError::invalid_response(message)
        },
    }
}

/// Map a reqwest transport failure into the error taxonomy
pub(crate) fn error_for_transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::timeout(format!("request timed out: {}", err))
    } else if err.is_decode() {
        SourceError::invalid_response(format!("unreadable body: {}", err))
    } else {
        SourceError::network(err.to_string())
    }
}
