//! Data contracts between the batch front end, the resolution engine and the
//! catalog adapters.
//!
//! Everything here is plain data: requests flow in, results flow out, and
//! nothing in this module performs I/O.

use crate::error::{SourceError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Sources
// ============================================================================

/// External catalog a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceId {
    /// Token-authenticated catalog (Spotify Web API compatible)
    CatalogA,
    /// Unauthenticated keyword catalog (iTunes Search API compatible)
    CatalogB,
}

impl SourceId {
    /// All sources in display priority order
    pub const ALL: [SourceId; 2] = [SourceId::CatalogA, SourceId::CatalogB];

    /// Display priority (lower ranks first)
    pub fn display_rank(self) -> u8 {
        match self {
            Self::CatalogA => 0,
            Self::CatalogB => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CatalogA => "CatalogA",
            Self::CatalogB => "CatalogB",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// What kind of artwork a request asks for, derived from its populated fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Artist only: artist photo
    ArtistPhoto,
    /// Artist + track (album, if present, only disambiguates)
    TrackArt,
    /// Artist + album, no track
    AlbumArt,
}

/// Raw wire shape of a request, normalised into [`LookupRequest`]
#[derive(Debug, Clone, Default, Deserialize)]
struct RawLookupRequest {
    #[serde(default)]
    artist: String,
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    album: Option<String>,
}

impl From<RawLookupRequest> for LookupRequest {
    fn from(raw: RawLookupRequest) -> Self {
        LookupRequest::new(raw.artist, raw.track, raw.album)
    }
}

/// One artist (+track/album) query unit.
///
/// Fields are trimmed on construction; blank optional fields become `None`.
/// An empty artist can be constructed but is rejected by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLookupRequest")]
pub struct LookupRequest {
    artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    album: Option<String>,
}

impl LookupRequest {
    pub fn new(
        artist: impl Into<String>,
        track: Option<String>,
        album: Option<String>,
    ) -> Self {
        Self {
            artist: artist.into().trim().to_string(),
            track: clean_optional(track),
            album: clean_optional(album),
        }
    }

    /// Artist photo request
    pub fn artist(artist: impl Into<String>) -> Self {
        Self::new(artist, None, None)
    }

    /// Track artwork request
    pub fn track(artist: impl Into<String>, track: impl Into<String>) -> Self {
        Self::new(artist, Some(track.into()), None)
    }

    /// Album artwork request
    pub fn album(artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self::new(artist, None, Some(album.into()))
    }

    pub fn artist_name(&self) -> &str {
        &self.artist
    }

    pub fn track_name(&self) -> Option<&str> {
        self.track.as_deref()
    }

    pub fn album_name(&self) -> Option<&str> {
        self.album.as_deref()
    }

    /// Query strategy for this request
    pub fn query_kind(&self) -> QueryKind {
        match (&self.track, &self.album) {
            (Some(_), _) => QueryKind::TrackArt,
            (None, Some(_)) => QueryKind::AlbumArt,
            (None, None) => QueryKind::ArtistPhoto,
        }
    }

    /// Album used to disambiguate track results (track + album requests only)
    pub fn album_filter(&self) -> Option<&str> {
        match self.query_kind() {
            QueryKind::TrackArt => self.album.as_deref(),
            _ => None,
        }
    }

    /// Local validation performed before any source is contacted
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.artist.is_empty() {
            return Err(ValidationError::MissingArtist);
        }
        Ok(())
    }

    /// File stem used by download collaborators: `artist_track` or
    /// `artist_artist_photo`, with path separators replaced.
    pub fn artwork_file_stem(&self) -> String {
        let label = self.track.as_deref().unwrap_or("artist_photo");
        format!("{}_{}", self.artist, label).replace('/', "_")
    }
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.track, &self.album) {
            (Some(track), _) => write!(f, "{} - {}", self.artist, track),
            (None, Some(album)) => write!(f, "{} - {}", self.artist, album),
            (None, None) => f.write_str(&self.artist),
        }
    }
}

/// Trim, and treat blanks and pandas-style "nan" placeholders as missing
fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
}

// ============================================================================
// Candidates
// ============================================================================

/// Kind of artwork image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtworkKind {
    ArtistPhoto,
    TrackArt,
    AlbumArt,
}

/// Release type of the artwork's album, when the source says
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseKind {
    Single,
    Album,
}

/// How well a candidate matches the query text.
///
/// Ordered from worst to best. `Deprioritized` marks track candidates whose
/// album failed the request's album filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relevance {
    Deprioritized,
    Weak,
    Partial,
    Exact,
}

/// Image dimensions in pixels; `(0, 0)` when the source does not report them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One concrete artwork image option returned by a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkCandidate {
    pub source: SourceId,
    pub kind: ArtworkKind,
    pub image_url: String,
    pub resolution: Resolution,
    /// Id of the artwork-owning entity (album or artist); dedup key per source
    pub source_entity_id: String,
    /// Display label (album name, or artist name for photos)
    pub title: String,
    pub album_name: Option<String>,
    pub track_name: Option<String>,
    /// Small rendition for thumbnails
    pub preview_url: Option<String>,
    pub release_kind: Option<ReleaseKind>,
    pub relevance: Relevance,
}

impl ArtworkCandidate {
    pub fn new(
        source: SourceId,
        kind: ArtworkKind,
        image_url: impl Into<String>,
        resolution: Resolution,
        source_entity_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            kind,
            image_url: image_url.into(),
            resolution,
            source_entity_id: source_entity_id.into(),
            title: String::new(),
            album_name: None,
            track_name: None,
            preview_url: None,
            release_kind: None,
            relevance: Relevance::Weak,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_album_name(mut self, album_name: impl Into<String>) -> Self {
        self.album_name = Some(album_name.into());
        self
    }

    pub fn with_track_name(mut self, track_name: impl Into<String>) -> Self {
        self.track_name = Some(track_name.into());
        self
    }

    pub fn with_preview_url(mut self, preview_url: impl Into<String>) -> Self {
        self.preview_url = Some(preview_url.into());
        self
    }

    pub fn with_release_kind(mut self, release_kind: ReleaseKind) -> Self {
        self.release_kind = Some(release_kind);
        self
    }

    pub fn with_relevance(mut self, relevance: Relevance) -> Self {
        self.relevance = relevance;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome tier for a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupStatus {
    /// Candidates found and every attempted source answered cleanly
    Resolved,
    /// Candidates found, but another source failed or was skipped
    PartiallyResolved,
    /// No candidates
    Failed,
}

/// Explanation attached to a result: source errors, skips and warnings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// `None` for local (validation / internal) diagnostics
    pub source: Option<SourceId>,
    pub http_status: Option<u16>,
    pub message: String,
    pub retryable: bool,
}

impl Diagnostic {
    pub fn from_source_error(source: SourceId, error: &SourceError) -> Self {
        Self {
            source: Some(source),
            http_status: error.http_status,
            message: error.to_string(),
            retryable: error.retryable,
        }
    }

    pub fn validation(error: &ValidationError) -> Self {
        Self {
            source: None,
            http_status: None,
            message: error.to_string(),
            retryable: false,
        }
    }

    /// Non-fatal note about one source
    pub fn warning(source: SourceId, message: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            http_status: None,
            message: message.into(),
            retryable: false,
        }
    }

    /// Unexpected fault while resolving one request
    pub fn internal() -> Self {
        Self {
            source: None,
            http_status: None,
            message: "internal error".to_string(),
            retryable: false,
        }
    }

    /// Request never dispatched because the batch was cancelled
    pub fn cancelled() -> Self {
        Self {
            source: None,
            http_status: None,
            message: "cancelled".to_string(),
            retryable: true,
        }
    }
}

/// Engine output for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub request: LookupRequest,
    pub status: LookupStatus,
    /// Best first; never empty unless `status` is `Failed`
    pub candidates: Vec<ArtworkCandidate>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LookupResult {
    pub fn failed(request: LookupRequest, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            request,
            status: LookupStatus::Failed,
            candidates: Vec::new(),
            diagnostics,
        }
    }

    pub fn internal_error(request: LookupRequest) -> Self {
        Self::failed(request, vec![Diagnostic::internal()])
    }

    pub fn cancelled(request: LookupRequest) -> Self {
        Self::failed(request, vec![Diagnostic::cancelled()])
    }

    /// Top-ranked candidate
    pub fn best(&self) -> Option<&ArtworkCandidate> {
        self.candidates.first()
    }
}

/// Per-batch counts for progress reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub partially_resolved: usize,
    pub failed: usize,
    pub candidates: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[LookupResult]) -> Self {
        results.iter().fold(
            Self {
                total: results.len(),
                ..Self::default()
            },
            |mut summary, result| {
                match result.status {
                    LookupStatus::Resolved => summary.resolved += 1,
                    LookupStatus::PartiallyResolved => summary.partially_resolved += 1,
                    LookupStatus::Failed => summary.failed += 1,
                }
                summary.candidates += result.candidates.len();
                summary
            },
        )
    }

    /// Requests with at least one candidate
    pub fn found(&self) -> usize {
        self.resolved + self.partially_resolved
    }
}
