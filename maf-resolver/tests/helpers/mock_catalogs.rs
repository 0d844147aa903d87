//! Local axum servers impersonating the two catalog HTTP APIs

use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";

// ============================================================================
// Catalog-A: token endpoint + search endpoint
// ============================================================================

#[derive(Default)]
pub struct CatalogAMock {
    pub base_url: String,
    pub token_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    /// Artificial latency of the token endpoint
    pub token_delay: Mutex<Duration>,
    /// Tokens the search endpoint answers with 401
    pub rejected_tokens: Mutex<HashSet<String>>,
    /// Answer every search with 401
    pub reject_all: Mutex<bool>,
    /// Last query string parameters seen by search
    pub last_query: Mutex<HashMap<String, String>>,
}

impl CatalogAMock {
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.base_url)
    }

    pub fn search_url(&self) -> String {
        format!("{}/v1/search", self.base_url)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn reject_token(&self, token: &str) {
        self.rejected_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn reject_all_searches(&self) {
        *self.reject_all.lock().unwrap() = true;
    }

    pub fn set_token_delay(&self, delay: Duration) {
        *self.token_delay.lock().unwrap() = delay;
    }
}

fn basic_credentials_ok(headers: &HeaderMap) -> bool {
    // base64("test-client:test-secret")
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Basic dGVzdC1jbGllbnQ6dGVzdC1zZWNyZXQ=")
        .unwrap_or(false)
}

async fn catalog_a_token(
    State(state): State<Arc<CatalogAMock>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let delay = *state.token_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "unsupported_grant_type"})))
            .into_response();
    }
    if !basic_credentials_ok(&headers) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_client"}))).into_response();
    }

    Json(json!({
        "access_token": format!("token-{}", n),
        "token_type": "Bearer",
        "expires_in": 3600
    }))
    .into_response()
}

async fn catalog_a_search(
    State(state): State<Arc<CatalogAMock>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.search_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = query.clone();

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();

    let rejected = *state.reject_all.lock().unwrap()
        || token.is_empty()
        || state.rejected_tokens.lock().unwrap().contains(&token);
    if rejected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
        )
            .into_response();
    }

    let body = match query.get("type").map(String::as_str) {
        Some("artist") => json!({
            "artists": {"items": [
                {"id": "artist-1", "name": "Test Artist",
                 "images": [{"url": "https://img.test/a/artist-640.jpg", "width": 640, "height": 640}]}
            ]}
        }),
        Some("album") => json!({
            "albums": {"items": [
                {"id": "album-1", "name": "Test Album", "album_type": "album",
                 "artists": [{"name": "Test Artist"}],
                 "images": [{"url": "https://img.test/a/album-640.jpg", "width": 640, "height": 640}]}
            ]}
        }),
        _ => json!({
            "tracks": {"items": [
                {"id": "track-1", "name": "Test Song",
                 "artists": [{"name": "Test Artist"}],
                 "album": {"id": "album-1", "name": "Test Song", "album_type": "single",
                           "images": [
                               {"url": "https://img.test/a/track-640.jpg", "width": 640, "height": 640},
                               {"url": "https://img.test/a/track-64.jpg", "width": 64, "height": 64}
                           ]}}
            ]}
        }),
    };
    Json(body).into_response()
}

/// Start a Catalog-A impersonation on an ephemeral port
pub async fn spawn_catalog_a() -> Arc<CatalogAMock> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");

    let state = Arc::new(CatalogAMock {
        base_url: format!("http://{}", addr),
        ..CatalogAMock::default()
    });
    let router = Router::new()
        .route("/api/token", post(catalog_a_token))
        .route("/v1/search", get(catalog_a_search))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    state
}

// ============================================================================
// Catalog-B: unauthenticated search endpoint
// ============================================================================

/// Scripted status for the next Catalog-B responses
#[derive(Debug, Clone, Copy)]
pub enum CatalogBReply {
    Ok,
    RateLimited { retry_after_secs: u64 },
    ServerError,
    Garbage,
}

pub struct CatalogBMock {
    pub base_url: String,
    pub search_calls: AtomicUsize,
    pub reply: Mutex<CatalogBReply>,
    pub last_query: Mutex<HashMap<String, String>>,
}

impl CatalogBMock {
    pub fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn set_reply(&self, reply: CatalogBReply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.last_query.lock().unwrap().clone()
    }
}

async fn catalog_b_search(
    State(state): State<Arc<CatalogBMock>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.search_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = query.clone();

    let reply = *state.reply.lock().unwrap();
    match reply {
        CatalogBReply::RateLimited { retry_after_secs } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            "slow down",
        )
            .into_response(),
        CatalogBReply::ServerError => {
            (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response()
        }
        CatalogBReply::Garbage => (StatusCode::OK, "<html>not json</html>").into_response(),
        CatalogBReply::Ok => {
            let art = "https://is1-ssl.mzstatic.test/image/thumb/Music/source";
            Json(json!({
                "resultCount": 1,
                "results": [{
                    "wrapperType": "track",
                    "trackId": 5001,
                    "collectionId": 7001,
                    "artistName": "Test Artist",
                    "collectionName": "Test Album",
                    "trackName": "Test Song",
                    "artworkUrl30": format!("{}/30x30bb.jpg", art),
                    "artworkUrl60": format!("{}/60x60bb.jpg", art),
                    "artworkUrl100": format!("{}/100x100bb.jpg", art)
                }]
            }))
            .into_response()
        }
    }
}

/// Start a Catalog-B impersonation on an ephemeral port
pub async fn spawn_catalog_b() -> Arc<CatalogBMock> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");

    let state = Arc::new(CatalogBMock {
        base_url: format!("http://{}", addr),
        search_calls: AtomicUsize::new(0),
        reply: Mutex::new(CatalogBReply::Ok),
        last_query: Mutex::new(HashMap::new()),
    });
    let router = Router::new()
        .route("/search", get(catalog_b_search))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    state
}
