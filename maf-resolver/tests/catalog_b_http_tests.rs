//! Catalog-B adapter against a local HTTP impersonation

mod helpers;

use helpers::{spawn_catalog_b, CatalogBMock, CatalogBReply};
use maf_resolver::sources::{CatalogBClient, CatalogBSettings};
use maf_resolver::{
    ArtworkSource, GuardedSource, LookupRequest, Resolution, RetryPolicy, SourceErrorKind,
    SourceHealth, SourceId,
};
use std::sync::Arc;
use std::time::Duration;

fn client(mock: &CatalogBMock) -> CatalogBClient {
    CatalogBClient::new(CatalogBSettings {
        search_url: mock.search_url(),
        country: Some("GB".to_string()),
        ..CatalogBSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_track_search_maps_largest_variant() {
    let mock = spawn_catalog_b().await;
    let client = client(&mock);

    let candidates = client
        .search(&LookupRequest::track("Test Artist", "Test Song"))
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    let candidate = &candidates[0];
    assert_eq!(candidate.source, SourceId::CatalogB);
    assert_eq!(candidate.resolution, Resolution::new(100, 100));
    assert!(candidate.image_url.ends_with("/3000x3000bb.jpg"));
    assert!(candidate
        .preview_url
        .as_deref()
        .is_some_and(|url| url.ends_with("/100x100bb.jpg")));
    assert_eq!(candidate.source_entity_id, "7001");

    let query = mock.last_query();
    assert_eq!(query.get("term").map(String::as_str), Some("Test Artist Test Song"));
    assert_eq!(query.get("entity").map(String::as_str), Some("musicTrack"));
    assert_eq!(query.get("media").map(String::as_str), Some("music"));
    assert_eq!(query.get("country").map(String::as_str), Some("GB"));
}

#[tokio::test]
async fn test_album_search_uses_album_entity() {
    let mock = spawn_catalog_b().await;
    client(&mock)
        .search(&LookupRequest::album("Test Artist", "Test Album"))
        .await
        .unwrap();

    let query = mock.last_query();
    assert_eq!(query.get("entity").map(String::as_str), Some("album"));
    assert_eq!(query.get("term").map(String::as_str), Some("Test Artist Test Album"));
}

#[tokio::test]
async fn test_artist_photo_never_reaches_server() {
    let mock = spawn_catalog_b().await;

    let err = client(&mock)
        .search(&LookupRequest::artist("Test Artist"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, SourceErrorKind::Unsupported);
    assert_eq!(mock.search_calls(), 0);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let mock = spawn_catalog_b().await;
    mock.set_reply(CatalogBReply::RateLimited { retry_after_secs: 7 });

    let err = client(&mock)
        .search(&LookupRequest::track("Test Artist", "Test Song"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, SourceErrorKind::RateLimited);
    assert_eq!(err.http_status, Some(429));
    assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    assert!(err.retryable);
}

#[tokio::test]
async fn test_server_error_and_garbage_classification() {
    let mock = spawn_catalog_b().await;
    let client = client(&mock);
    let request = LookupRequest::track("Test Artist", "Test Song");

    mock.set_reply(CatalogBReply::ServerError);
    let err = client.search(&request).await.unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::ServerError);
    assert_eq!(err.http_status, Some(503));
    assert!(err.message.contains("maintenance"));

    mock.set_reply(CatalogBReply::Garbage);
    let err = client.search(&request).await.unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::InvalidResponse);
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CatalogBClient::new(CatalogBSettings {
        search_url: format!("http://{}/search", addr),
        ..CatalogBSettings::default()
    })
    .unwrap();

    let err = client
        .search(&LookupRequest::track("Test Artist", "Test Song"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, SourceErrorKind::Network);
    assert!(err.retryable);
}

#[tokio::test]
async fn test_controller_retries_rate_limited_server() {
    // Given: a server that always answers 429 with Retry-After: 0
    let mock = spawn_catalog_b().await;
    mock.set_reply(CatalogBReply::RateLimited { retry_after_secs: 0 });
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(10),
        ..RetryPolicy::default()
    };
    let guarded = GuardedSource::new(
        Arc::new(client(&mock)),
        Arc::new(SourceHealth::new(SourceId::CatalogB)),
        policy,
    );

    // When
    let err = guarded
        .search(&LookupRequest::track("Test Artist", "Test Song"))
        .await
        .unwrap_err();

    // Then: one call plus two retries
    assert_eq!(err.kind, SourceErrorKind::RateLimited);
    assert_eq!(mock.search_calls(), 3);
    assert_eq!(guarded.health().consecutive_failures(), 1);
}
