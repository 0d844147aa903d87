//! Rate/Retry Controller
//!
//! [`GuardedSource`] wraps one [`ArtworkSource`] and is the only writer of
//! that source's [`SourceHealth`]. Per call it:
//! 1. short-circuits with `Suppressed` while the source is suppressed
//! 2. waits on the optional request pacer
//! 3. runs the adapter call under a fixed per-call timeout
//! 4. retries transient failures with jittered exponential backoff
//! 5. records the final outcome against the source's health

use crate::error::{SourceError, SourceErrorKind};
use crate::health::{SourceHealth, SuppressionPolicy};
use crate::model::{ArtworkCandidate, LookupRequest, SourceId};
use crate::sources::ArtworkSource;
use governor::{Quota, RateLimiter};
use maf_common::human_time::format_duration;
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type Pacer = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Retry, timeout and suppression parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Backoff multiplier per retry
    pub factor: f64,
    /// Relative jitter applied to each delay (0.2 = ±20%)
    pub jitter: f64,
    /// Extra attempts after a 429, timeout or network failure
    pub rate_limit_retries: u32,
    /// Extra attempts after a 5xx
    pub server_error_retries: u32,
    /// Ceiling for a single adapter call, independent of backoff
    pub call_timeout: Duration,
    /// Longest server-requested wait that will be honoured
    pub max_retry_after: Duration,
    pub suppression: SuppressionPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            jitter: 0.2,
            rate_limit_retries: 2,
            server_error_retries: 1,
            call_timeout: Duration::from_secs(10),
            max_retry_after: Duration::from_secs(10),
            suppression: SuppressionPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Extra attempts allowed after an error of this kind
    pub fn retry_budget(&self, kind: SourceErrorKind) -> u32 {
        match kind {
            SourceErrorKind::RateLimited | SourceErrorKind::Timeout | SourceErrorKind::Network => {
                self.rate_limit_retries
            }
            SourceErrorKind::ServerError => self.server_error_retries,
            _ => 0,
        }
    }

    /// Jittered delay before retry number `retry` (0-based)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let nominal = self.base_delay.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        let jitter = self.jitter.clamp(0.0, 1.0);
        let scale = if jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };
        Duration::try_from_secs_f64(nominal * scale).unwrap_or(Duration::MAX)
    }

    /// Delay before the next attempt, or `None` when the error is final
    fn next_delay(&self, error: &SourceError, retries_done: u32) -> Option<Duration> {
        if retries_done >= self.retry_budget(error.kind) {
            return None;
        }
        let backoff = self.backoff_delay(retries_done);
        match error.retry_after {
            Some(wait) if wait > self.max_retry_after => None,
            Some(wait) => Some(backoff.max(wait)),
            None => Some(backoff),
        }
    }
}

/// One source behind the retry/suppression policy
pub struct GuardedSource {
    inner: Arc<dyn ArtworkSource>,
    health: Arc<SourceHealth>,
    policy: RetryPolicy,
    pacer: Option<Arc<Pacer>>,
}

impl GuardedSource {
    pub fn new(
        inner: Arc<dyn ArtworkSource>,
        health: Arc<SourceHealth>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            health,
            policy,
            pacer: None,
        }
    }

    /// Pace attempts to at most `requests_per_minute` (`None` or 0 disables)
    pub fn with_pacing(mut self, requests_per_minute: Option<u32>) -> Self {
        self.pacer = requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));
        self
    }

    pub fn id(&self) -> SourceId {
        self.inner.id()
    }

    pub fn health(&self) -> &Arc<SourceHealth> {
        &self.health
    }

    fn suppressed_error(&self) -> Option<SourceError> {
        if self.health.is_permanently_suppressed() {
            return Some(SourceError::suppressed(None));
        }
        self.health
            .suppression_remaining()
            .map(|remaining| SourceError::suppressed(Some(remaining)))
    }

    async fn attempt(&self, request: &LookupRequest) -> Result<Vec<ArtworkCandidate>, SourceError> {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
            // The source may have been suppressed while this call was parked
            if let Some(suppressed) = self.suppressed_error() {
                return Err(suppressed);
            }
        }
        match tokio::time::timeout(self.policy.call_timeout, self.inner.search(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SourceError::timeout(format!(
                "no response within {}",
                format_duration(self.policy.call_timeout)
            ))),
        }
    }

    /// Search through the policy. Never panics on source failure; every
    /// failure comes back as a classified [`SourceError`].
    pub async fn search(
        &self,
        request: &LookupRequest,
    ) -> Result<Vec<ArtworkCandidate>, SourceError> {
        let source = self.id();

        if !self.inner.supports(request.query_kind()) {
            // Adapter answers Unsupported without network I/O
            return self.inner.search(request).await;
        }

        let mut retries_done = 0u32;
        loop {
            if let Some(suppressed) = self.suppressed_error() {
                tracing::debug!(
                    source = %source,
                    request = %request,
                    "Source suppressed, skipping call"
                );
                return Err(suppressed);
            }

            tracing::debug!(
                source = %source,
                attempt = retries_done + 1,
                request = %request,
                "Calling source"
            );

            let error = match self.attempt(request).await {
                Ok(candidates) => {
                    self.health.record_success();
                    return Ok(candidates);
                }
                Err(error) => error,
            };

            if matches!(
                error.kind,
                SourceErrorKind::Unsupported | SourceErrorKind::Suppressed
            ) {
                return Err(error);
            }

            match self.policy.next_delay(&error, retries_done) {
                Some(delay) => {
                    tracing::warn!(
                        source = %source,
                        attempt = retries_done + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Source call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retries_done += 1;
                }
                None => return Err(self.give_up(error, retries_done)),
            }
        }
    }

    /// Record an exhausted failure and hand the error back
    fn give_up(&self, error: SourceError, retries_done: u32) -> SourceError {
        let source = self.id();
        if !error.kind.counts_against_health() {
            tracing::debug!(source = %source, error = %error, "Source call failed");
            return error;
        }

        let tripped = self.health.record_failure(&self.policy.suppression);
        match tripped {
            Some(window) => tracing::warn!(
                source = %source,
                consecutive_failures = self.health.consecutive_failures(),
                suppressed_for = %format_duration(window),
                error = %error,
                "Source suppressed after repeated failures"
            ),
            None => tracing::info!(
                source = %source,
                retries = retries_done,
                consecutive_failures = self.health.consecutive_failures(),
                error = %error,
                "Source call failed after retries"
            ),
        }
        error
    }
}
