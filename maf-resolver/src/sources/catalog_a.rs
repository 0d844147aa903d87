//! Catalog-A client (Spotify Web API compatible)
//!
//! Auth is a client-credentials exchange for a bearer token. The token is
//! cached with its expiry and shared by all concurrent searches:
//! - reads go through an `RwLock` that is never held across network I/O
//! - exchanges are serialised by a separate gate mutex, and every caller
//!   re-checks the cache after acquiring it, so concurrent callers wait for
//!   one exchange instead of issuing their own
//!
//! A 401 on a search is the auth-expired signal: the token is re-exchanged
//! exactly once and the search repeated. A second 401 is `AuthFailed`.

use super::{
    apply_album_filter, build_http_client, error_for_status, error_for_transport, pick_largest,
    retry_after, score, ArtworkSource, ImageVariant,
};
use crate::error::SourceError;
use crate::matching;
use crate::model::{
    ArtworkCandidate, ArtworkKind, LookupRequest, QueryKind, Relevance, ReleaseKind, Resolution,
    SourceId,
};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SEARCH_URL: &str = "https://api.spotify.com/v1/search";

/// Tokens this close to expiry are treated as expired
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Client id/secret pair for the token exchange
#[derive(Clone, PartialEq, Eq)]
pub struct CatalogACredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for CatalogACredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogACredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Endpoint and query settings
#[derive(Debug, Clone)]
pub struct CatalogASettings {
    pub auth_url: String,
    pub search_url: String,
    /// Items requested per search
    pub result_limit: u32,
    /// Optional ISO 3166-1 market filter
    pub market: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for CatalogASettings {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            result_limit: 5,
            market: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
    /// Exchange counter value that produced this token
    generation: u64,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

// Search response shapes (only the fields we use)

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    artists: Option<Page<ArtistItem>>,
    albums: Option<Page<AlbumItem>>,
    tracks: Option<Page<TrackItem>>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    // Catalog-A occasionally returns null entries inside `items`
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    id: String,
    name: String,
    album_type: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    images: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    album: AlbumItem,
    #[serde(default)]
    artists: Vec<ArtistRef>,
}

/// Outcome of a single authenticated search call
enum SearchReply {
    Body(String),
    Unauthorized,
}

/// Catalog-A API client
pub struct CatalogAClient {
    http: reqwest::Client,
    settings: CatalogASettings,
    credentials: Option<CatalogACredentials>,
    token: RwLock<Option<CachedToken>>,
    exchange_gate: Mutex<()>,
    exchanges: AtomicU64,
}

impl CatalogAClient {
    /// Create a client. `credentials: None` yields an adapter that reports
    /// every search as `Suppressed` without touching the network.
    pub fn new(
        settings: CatalogASettings,
        credentials: Option<CatalogACredentials>,
    ) -> Result<Self, maf_common::Error> {
        Ok(Self {
            http: build_http_client(settings.connect_timeout)?,
            settings,
            credentials,
            token: RwLock::new(None),
            exchange_gate: Mutex::new(()),
            exchanges: AtomicU64::new(0),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Number of token exchanges performed so far
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Acquire)
    }

    async fn fresh_cached_token(&self) -> Option<CachedToken> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_fresh())
            .cloned()
    }

    /// Cached token, exchanging credentials when missing or expired
    async fn current_token(
        &self,
        credentials: &CatalogACredentials,
    ) -> Result<CachedToken, SourceError> {
        if let Some(token) = self.fresh_cached_token().await {
            return Ok(token);
        }

        let _gate = self.exchange_gate.lock().await;
        // Another caller may have exchanged while we waited
        if let Some(token) = self.fresh_cached_token().await {
            return Ok(token);
        }
        self.exchange(credentials).await
    }

    /// Replace a token the API just rejected.
    ///
    /// If a concurrent caller already replaced `rejected_generation`, reuse
    /// its token instead of exchanging again.
    async fn replace_rejected_token(
        &self,
        credentials: &CatalogACredentials,
        rejected_generation: u64,
    ) -> Result<CachedToken, SourceError> {
        let _gate = self.exchange_gate.lock().await;
        if let Some(token) = self.fresh_cached_token().await {
            if token.generation != rejected_generation {
                return Ok(token);
            }
        }
        self.exchange(credentials).await
    }

    /// Client-credentials exchange; caller must hold `exchange_gate`
    async fn exchange(
        &self,
        credentials: &CatalogACredentials,
    ) -> Result<CachedToken, SourceError> {
        let generation = self.exchanges.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation, "Exchanging Catalog-A credentials for access token");

        let response = self
            .http
            .post(&self.settings.auth_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(error_for_transport)?;

        let status = response.status();
        if !status.is_success() {
            let wait = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 | 401 | 403 => SourceError::auth_failed(
                    Some(status.as_u16()),
                    format!("credential exchange rejected (HTTP {})", status.as_u16()),
                ),
                _ => error_for_status(status, wait, &body),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SourceError::invalid_response(format!("token response unreadable: {}", e))
        })?;

        let cached = CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
            generation,
        };
        *self.token.write().await = Some(cached.clone());

        tracing::info!(
            generation,
            expires_in_secs = token.expires_in,
            "Catalog-A access token obtained"
        );
        Ok(cached)
    }

    async fn send_search(
        &self,
        access_token: &str,
        params: &[(&str, String)],
    ) -> Result<SearchReply, SourceError> {
        let response = self
            .http
            .get(&self.settings.search_url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await
            .map_err(error_for_transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(SearchReply::Unauthorized);
        }

        let wait = retry_after(response.headers());
        let body = response.text().await.map_err(error_for_transport)?;
        if !status.is_success() {
            return Err(error_for_status(status, wait, &body));
        }
        Ok(SearchReply::Body(body))
    }

    /// Query parameters for the request's strategy
    fn query_params(&self, request: &LookupRequest) -> Vec<(&'static str, String)> {
        let artist = request.artist_name();
        let (query, search_type) = match request.query_kind() {
            QueryKind::ArtistPhoto => (format!("artist:{}", artist), "artist"),
            QueryKind::TrackArt => (
                format!(
                    "track:{} artist:{}",
                    request.track_name().unwrap_or_default(),
                    artist
                ),
                "track",
            ),
            QueryKind::AlbumArt => (
                format!(
                    "album:{} artist:{}",
                    request.album_name().unwrap_or_default(),
                    artist
                ),
                "album",
            ),
        };

        let mut params = vec![
            ("q", query),
            ("type", search_type.to_string()),
            ("limit", self.settings.result_limit.to_string()),
        ];
        if let Some(market) = &self.settings.market {
            params.push(("market", market.clone()));
        }
        params
    }
}

#[async_trait::async_trait]
impl ArtworkSource for CatalogAClient {
    fn id(&self) -> SourceId {
        SourceId::CatalogA
    }

    async fn search(&self, request: &LookupRequest) -> Result<Vec<ArtworkCandidate>, SourceError> {
        let Some(credentials) = &self.credentials else {
            return Err(SourceError::suppressed(None));
        };

        let params = self.query_params(request);
        tracing::debug!(request = %request, "Querying Catalog-A");

        let token = self.current_token(credentials).await?;
        let body = match self.send_search(&token.access_token, &params).await? {
            SearchReply::Body(body) => body,
            SearchReply::Unauthorized => {
                tracing::warn!(
                    generation = token.generation,
                    "Catalog-A rejected access token, re-exchanging once"
                );
                let fresh = self
                    .replace_rejected_token(credentials, token.generation)
                    .await?;
                match self.send_search(&fresh.access_token, &params).await? {
                    SearchReply::Body(body) => body,
                    SearchReply::Unauthorized => {
                        return Err(SourceError::auth_failed(
                            Some(401),
                            "access token rejected after re-exchange",
                        ))
                    }
                }
            }
        };

        parse_search_response(&body, request)
    }
}

fn largest_image(images: &[ImageItem]) -> Option<(String, Resolution)> {
    let variants: Vec<ImageVariant> = images
        .iter()
        .map(|image| ImageVariant {
            url: image.url.clone(),
            width: image.width.unwrap_or(0),
            height: image.height.unwrap_or(0),
        })
        .collect();
    pick_largest(&variants).map(|v| (v.url.clone(), Resolution::new(v.width, v.height)))
}

/// Smallest non-empty image, used as a thumbnail
fn smallest_image(images: &[ImageItem]) -> Option<&str> {
    images
        .iter()
        .filter(|image| image.width.unwrap_or(0) > 0)
        .min_by_key(|image| {
            u64::from(image.width.unwrap_or(0)) * u64::from(image.height.unwrap_or(0))
        })
        .map(|image| image.url.as_str())
}

fn release_kind(album_type: Option<&str>) -> Option<ReleaseKind> {
    match album_type? {
        "single" => Some(ReleaseKind::Single),
        _ => Some(ReleaseKind::Album),
    }
}

fn album_candidate(
    album: &AlbumItem,
    kind: ArtworkKind,
    relevance: Relevance,
) -> Option<ArtworkCandidate> {
    let (url, resolution) = largest_image(&album.images)?;
    let mut candidate = ArtworkCandidate::new(SourceId::CatalogA, kind, url, resolution, &album.id)
        .with_title(&album.name)
        .with_album_name(&album.name)
        .with_relevance(relevance);
    if let Some(preview) = smallest_image(&album.images) {
        candidate = candidate.with_preview_url(preview);
    }
    if let Some(release) = release_kind(album.album_type.as_deref()) {
        candidate = candidate.with_release_kind(release);
    }
    Some(candidate)
}

/// Map a Catalog-A search body into candidates for `request`
pub fn parse_search_response(
    body: &str,
    request: &LookupRequest,
) -> Result<Vec<ArtworkCandidate>, SourceError> {
    let envelope: SearchEnvelope = serde_json::from_str(body)
        .map_err(|e| SourceError::invalid_response(format!("Catalog-A search body: {}", e)))?;

    let candidates = match request.query_kind() {
        QueryKind::ArtistPhoto => envelope
            .artists
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            // Unrelated artists are never offered
            .filter(|artist| matching::names_equal(request.artist_name(), &artist.name))
            .filter_map(|artist| {
                let (url, resolution) = largest_image(&artist.images)?;
                let mut candidate = ArtworkCandidate::new(
                    SourceId::CatalogA,
                    ArtworkKind::ArtistPhoto,
                    url,
                    resolution,
                    &artist.id,
                )
                .with_title(&artist.name)
                .with_relevance(Relevance::Exact);
                if let Some(preview) = smallest_image(&artist.images) {
                    candidate = candidate.with_preview_url(preview);
                }
                Some(candidate)
            })
            .collect(),
        QueryKind::AlbumArt => {
            let target = request.album_name().unwrap_or_default();
            envelope
                .albums
                .map(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .filter_map(|album| {
                    let artists: Vec<&str> =
                        album.artists.iter().map(|a| a.name.as_str()).collect();
                    let relevance = score(request, target, &album.name, &artists);
                    album_candidate(&album, ArtworkKind::AlbumArt, relevance)
                })
                .collect()
        }
        QueryKind::TrackArt => {
            let target = request.track_name().unwrap_or_default();
            let mut candidates: Vec<ArtworkCandidate> = envelope
                .tracks
                .map(|page| page.items)
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .filter_map(|track| {
                    let artists: Vec<&str> =
                        track.artists.iter().map(|a| a.name.as_str()).collect();
                    let relevance = score(request, target, &track.name, &artists);
                    album_candidate(&track.album, ArtworkKind::TrackArt, relevance)
                        .map(|candidate| candidate.with_track_name(&track.name))
                })
                .collect();
            if let Some(album) = request.album_filter() {
                apply_album_filter(&mut candidates, album);
            }
            candidates
        }
    };

    Ok(candidates)
}
