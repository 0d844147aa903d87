//! Batch Orchestrator
//!
//! Fans a batch of requests out over a bounded number of concurrent
//! resolutions and returns results in input order. Each request runs in its
//! own task so a panic while resolving one entry becomes a `Failed` result
//! for that entry only.

use crate::engine::Resolve;
use crate::model::{BatchSummary, LookupRequest, LookupResult};
use futures::stream::{self, StreamExt};
use maf_common::human_time::format_duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY_LIMIT: usize = 32;

/// Progress is logged every this many completed requests
const PROGRESS_INTERVAL: usize = 10;

/// Clamp a requested concurrency into `1..=MAX_CONCURRENCY_LIMIT`
pub fn effective_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_CONCURRENCY_LIMIT)
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    resolver: Arc<dyn Resolve>,
}

impl BatchOrchestrator {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self { resolver }
    }

    /// Resolve every request; `output[i]` always corresponds to `requests[i]`
    pub async fn resolve_all(
        &self,
        requests: &[LookupRequest],
        max_concurrency: usize,
    ) -> Vec<LookupResult> {
        self.resolve_all_cancellable(requests, max_concurrency, &CancellationToken::new())
            .await
    }

    /// Like [`resolve_all`](Self::resolve_all), but stops dispatching new
    /// requests once `cancel_token` fires. In-flight resolutions finish
    /// normally; requests never dispatched come back as cancelled.
    pub async fn resolve_all_cancellable(
        &self,
        requests: &[LookupRequest],
        max_concurrency: usize,
        cancel_token: &CancellationToken,
    ) -> Vec<LookupResult> {
        let total = requests.len();
        let limit = effective_concurrency(max_concurrency);
        let started = Instant::now();

        tracing::info!(total, max_concurrency = limit, "Starting batch resolution");

        let completed = Arc::new(AtomicUsize::new(0));
        let mut slots: Vec<Option<LookupResult>> = vec![None; total];

        let indexed = requests.iter().cloned().enumerate();
        let finished: Vec<(usize, LookupResult)> = stream::iter(indexed)
            .map(|(index, request)| {
                let resolver = self.resolver.clone();
                let cancel_token = cancel_token.clone();
                let completed = completed.clone();

                async move {
                    if cancel_token.is_cancelled() {
                        return (index, LookupResult::cancelled(request));
                    }

                    let task_request = request.clone();
                    let handle = tokio::spawn(async move { resolver.resolve(task_request).await });
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            tracing::error!(
                                index,
                                request = %request,
                                error = %join_error,
                                "Request resolution crashed"
                            );
                            LookupResult::internal_error(request)
                        }
                    };

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_INTERVAL == 0 || done == total {
                        tracing::info!(progress = format!("{}/{}", done, total), "Batch progress");
                    }
                    (index, result)
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (index, result) in finished {
            slots[index] = Some(result);
        }

        // Every index is produced exactly once by the stream above
        let results: Vec<LookupResult> = slots
            .into_iter()
            .zip(requests.iter())
            .map(|(slot, request)| {
                slot.unwrap_or_else(|| LookupResult::internal_error(request.clone()))
            })
            .collect();

        let summary = BatchSummary::from_results(&results);
        if cancel_token.is_cancelled() {
            tracing::info!(
                total = summary.total,
                found = summary.found(),
                failed = summary.failed,
                "Batch cancelled"
            );
        } else {
            tracing::info!(
                total = summary.total,
                resolved = summary.resolved,
                partially_resolved = summary.partially_resolved,
                failed = summary.failed,
                candidates = summary.candidates,
                elapsed = %format_duration(started.elapsed()),
                "Batch resolution completed"
            );
        }

        results
    }
}
