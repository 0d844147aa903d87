//! Scripted in-process `ArtworkSource` with call counters and a concurrency gauge

use maf_resolver::{
    ArtworkCandidate, ArtworkKind, ArtworkSource, GuardedSource, LookupRequest, QueryKind,
    Resolution, RetryPolicy, SourceError, SourceHealth, SourceId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Reply = Result<Vec<ArtworkCandidate>, SourceError>;
type Handler = Box<dyn Fn(&LookupRequest) -> Reply + Send + Sync>;
type DelayFn = Box<dyn Fn(&LookupRequest) -> Duration + Send + Sync>;

pub struct MockSource {
    id: SourceId,
    artist_photos: bool,
    handler: Handler,
    delay: DelayFn,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn with_handler<F>(id: SourceId, handler: F) -> Self
    where
        F: Fn(&LookupRequest) -> Result<Vec<ArtworkCandidate>, SourceError> + Send + Sync + 'static,
    {
        Self {
            id,
            artist_photos: true,
            handler: Box::new(handler),
            delay: Box::new(|_| Duration::ZERO),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answers with clones of `candidates`
    pub fn returning(id: SourceId, candidates: Vec<ArtworkCandidate>) -> Self {
        Self::with_handler(id, move |_| Ok(candidates.clone()))
    }

    /// Always fails with `error`
    pub fn failing(id: SourceId, error: SourceError) -> Self {
        Self::with_handler(id, move |_| Err(error.clone()))
    }

    /// Catalog-B style: artist photo queries are unsupported
    pub fn without_artist_photos(mut self) -> Self {
        self.artist_photos = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Box::new(move |_| delay);
        self
    }

    pub fn with_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(&LookupRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    /// Calls that reached the "network"
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArtworkSource for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn supports(&self, kind: QueryKind) -> bool {
        self.artist_photos || kind != QueryKind::ArtistPhoto
    }

    async fn search(&self, request: &LookupRequest) -> Result<Vec<ArtworkCandidate>, SourceError> {
        if !self.supports(request.query_kind()) {
            return Err(SourceError::unsupported("artist photos not available"));
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay)(request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.handler)(request)
    }
}

/// Track-art candidate with a square image of `size` pixels
pub fn candidate(source: SourceId, entity_id: &str, size: u32) -> ArtworkCandidate {
    ArtworkCandidate::new(
        source,
        ArtworkKind::TrackArt,
        format!("https://img.test/{}/{}.jpg", source, entity_id),
        Resolution::new(size, size),
        entity_id,
    )
}

/// Default policy without jitter so paused-time assertions are exact
pub fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        jitter: 0.0,
        ..RetryPolicy::default()
    }
}

/// Wrap a mock behind the controller with the given health record
pub fn guarded(source: &Arc<MockSource>, health: &Arc<SourceHealth>) -> GuardedSource {
    GuardedSource::new(source.clone(), health.clone(), quick_policy())
}
