//! Catalog-B client (iTunes Search API compatible)
//!
//! Unauthenticated keyword search. Artwork comes in fixed size variants
//! (`artworkUrl30/60/100`); the largest variant's URL is rewritten to the
//! configured high-resolution size token.

use super::{
    apply_album_filter, build_http_client, error_for_status, error_for_transport, pick_largest,
    retry_after, score, ArtworkSource, ImageVariant,
};
use crate::error::SourceError;
use crate::model::{
    ArtworkCandidate, ArtworkKind, LookupRequest, QueryKind, ReleaseKind, Resolution, SourceId,
};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SEARCH_URL: &str = "https://itunes.apple.com/search";
pub const DEFAULT_ARTWORK_SIZE: &str = "3000x3000bb";

/// Endpoint and query settings
#[derive(Debug, Clone)]
pub struct CatalogBSettings {
    pub search_url: String,
    pub result_limit: u32,
    /// Optional storefront country code
    pub country: Option<String>,
    /// Size token substituted into artwork URLs, e.g. "3000x3000bb"
    pub artwork_size: String,
    pub connect_timeout: Duration,
}

impl Default for CatalogBSettings {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            result_limit: 5,
            country: None,
            artwork_size: DEFAULT_ARTWORK_SIZE.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Vec<ResultItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultItem {
    track_id: Option<u64>,
    collection_id: Option<u64>,
    artist_name: Option<String>,
    collection_name: Option<String>,
    track_name: Option<String>,
    artwork_url30: Option<String>,
    artwork_url60: Option<String>,
    artwork_url100: Option<String>,
}

impl ResultItem {
    fn variants(&self) -> Vec<ImageVariant> {
        [
            (&self.artwork_url30, 30),
            (&self.artwork_url60, 60),
            (&self.artwork_url100, 100),
        ]
        .into_iter()
        .filter_map(|(url, nominal)| {
            let url = url.as_deref()?.trim();
            if url.is_empty() {
                return None;
            }
            let (width, height) = variant_dimensions(url).unwrap_or((nominal, nominal));
            Some(ImageVariant {
                url: url.to_string(),
                width,
                height,
            })
        })
        .collect()
    }

    fn entity_id(&self) -> Option<String> {
        self.collection_id
            .or(self.track_id)
            .map(|id| id.to_string())
    }
}

/// Catalog-B API client
pub struct CatalogBClient {
    http: reqwest::Client,
    settings: CatalogBSettings,
}

impl CatalogBClient {
    pub fn new(settings: CatalogBSettings) -> Result<Self, maf_common::Error> {
        Ok(Self {
            http: build_http_client(settings.connect_timeout)?,
            settings,
        })
    }

    /// Query parameters; `None` for query kinds this catalog cannot serve
    fn query_params(&self, request: &LookupRequest) -> Option<Vec<(&'static str, String)>> {
        let artist = request.artist_name();
        let (term, entity) = match request.query_kind() {
            QueryKind::ArtistPhoto => return None,
            QueryKind::TrackArt => (
                format!("{} {}", artist, request.track_name().unwrap_or_default()),
                "musicTrack",
            ),
            QueryKind::AlbumArt => (
                format!("{} {}", artist, request.album_name().unwrap_or_default()),
                "album",
            ),
        };

        let mut params = vec![
            ("term", term),
            ("media", "music".to_string()),
            ("entity", entity.to_string()),
            ("limit", self.settings.result_limit.to_string()),
        ];
        if let Some(country) = &self.settings.country {
            params.push(("country", country.clone()));
        }
        Some(params)
    }
}

#[async_trait::async_trait]
impl ArtworkSource for CatalogBClient {
    fn id(&self) -> SourceId {
        SourceId::CatalogB
    }

    fn supports(&self, kind: QueryKind) -> bool {
        kind != QueryKind::ArtistPhoto
    }

    async fn search(&self, request: &LookupRequest) -> Result<Vec<ArtworkCandidate>, SourceError> {
        let Some(params) = self.query_params(request) else {
            return Err(SourceError::unsupported(
                "artist photos are not available from this catalog",
            ));
        };

        tracing::debug!(request = %request, "Querying Catalog-B");

        let response = self
            .http
            .get(&self.settings.search_url)
            .query(&params)
            .send()
            .await
            .map_err(error_for_transport)?;

        let status = response.status();
        let wait = retry_after(response.headers());
        let body = response.text().await.map_err(error_for_transport)?;
        if !status.is_success() {
            return Err(error_for_status(status, wait, &body));
        }

        parse_search_response(&body, request, &self.settings.artwork_size)
    }
}

/// Pixel size encoded in the last path segment, e.g. ".../100x100bb.jpg"
fn variant_dimensions(url: &str) -> Option<(u32, u32)> {
    let segment = url.rsplit('/').next()?;
    let stem = segment.split('.').next()?;
    let (width, rest) = stem.split_once('x')?;
    let height: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some((width.parse().ok()?, height.parse().ok()?))
}

/// Rewrite the "{w}x{h}bb" size token in an artwork URL
pub fn upscale_artwork_url(url: &str, width: u32, height: u32, size: &str) -> String {
    let token = format!("{}x{}bb", width, height);
    match url.rfind(&token) {
        Some(at) => format!("{}{}{}", &url[..at], size, &url[at + token.len()..]),
        None => url.to_string(),
    }
}

/// No explicit flag exists; infer from the collection name or the classic
/// single pattern where track and collection share a name.
fn infer_release_kind(collection: &str, track: Option<&str>) -> ReleaseKind {
    let collection = collection.trim().to_lowercase();
    let same_as_track = track.is_some_and(|t| t.trim().to_lowercase() == collection);
    if collection.contains("single") || same_as_track {
        ReleaseKind::Single
    } else {
        ReleaseKind::Album
    }
}

/// Map a Catalog-B search body into candidates for `request`
pub fn parse_search_response(
    body: &str,
    request: &LookupRequest,
    artwork_size: &str,
) -> Result<Vec<ArtworkCandidate>, SourceError> {
    let envelope: SearchEnvelope = serde_json::from_str(body)
        .map_err(|e| SourceError::invalid_response(format!("Catalog-B search body: {}", e)))?;

    let (kind, target) = match request.query_kind() {
        QueryKind::ArtistPhoto => return Ok(Vec::new()),
        QueryKind::TrackArt => (ArtworkKind::TrackArt, request.track_name().unwrap_or_default()),
        QueryKind::AlbumArt => (ArtworkKind::AlbumArt, request.album_name().unwrap_or_default()),
    };

    let mut candidates: Vec<ArtworkCandidate> = envelope
        .results
        .iter()
        .filter_map(|item| {
            let entity_id = item.entity_id()?;
            let variants = item.variants();
            let best = pick_largest(&variants)?;

            let collection = item.collection_name.as_deref().unwrap_or_default();
            let title = match kind {
                ArtworkKind::TrackArt => item.track_name.as_deref().unwrap_or_default(),
                _ => collection,
            };
            let artists: Vec<&str> = item.artist_name.as_deref().into_iter().collect();

            let mut candidate = ArtworkCandidate::new(
                SourceId::CatalogB,
                kind,
                upscale_artwork_url(&best.url, best.width, best.height, artwork_size),
                Resolution::new(best.width, best.height),
                entity_id,
            )
            .with_title(collection)
            .with_preview_url(&best.url)
            .with_release_kind(infer_release_kind(collection, item.track_name.as_deref()))
            .with_relevance(score(request, target, title, &artists));

            if !collection.is_empty() {
                candidate = candidate.with_album_name(collection);
            }
            if let Some(track) = &item.track_name {
                candidate = candidate.with_track_name(track);
            }
            Some(candidate)
        })
        .collect();

    if let Some(album) = request.album_filter() {
        apply_album_filter(&mut candidates, album);
    }
    Ok(candidates)
}
