//! Resolution Engine
//!
//! Resolves one [`LookupRequest`] by querying both catalogs concurrently
//! through their controllers, then merging, ranking and classifying the
//! outcome. Source errors never escape; they become diagnostics.

use crate::controller::GuardedSource;
use crate::error::SourceError;
use crate::model::{
    ArtworkCandidate, Diagnostic, LookupRequest, LookupResult, LookupStatus, Relevance, SourceId,
};
use std::cmp::Reverse;
use std::collections::HashSet;

/// Anything that can turn a request into a result
#[async_trait::async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, request: LookupRequest) -> LookupResult;
}

/// What one source contributed to a resolution
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: SourceId,
    pub result: Result<Vec<ArtworkCandidate>, SourceError>,
}

pub struct ResolutionEngine {
    catalog_a: GuardedSource,
    catalog_b: GuardedSource,
}

impl ResolutionEngine {
    pub fn new(catalog_a: GuardedSource, catalog_b: GuardedSource) -> Self {
        Self {
            catalog_a,
            catalog_b,
        }
    }

    async fn query(source: &GuardedSource, request: &LookupRequest) -> SourceOutcome {
        SourceOutcome {
            source: source.id(),
            result: source.search(request).await,
        }
    }
}

#[async_trait::async_trait]
impl Resolve for ResolutionEngine {
    async fn resolve(&self, request: LookupRequest) -> LookupResult {
        if let Err(error) = request.validate() {
            tracing::debug!(request = %request, error = %error, "Rejected request");
            return LookupResult::failed(request, vec![Diagnostic::validation(&error)]);
        }

        // Both are always attempted; the controllers short-circuit suppressed ones
        let (outcome_a, outcome_b) = tokio::join!(
            Self::query(&self.catalog_a, &request),
            Self::query(&self.catalog_b, &request),
        );

        let result = assemble_result(request, vec![outcome_a, outcome_b]);
        tracing::debug!(
            request = %result.request,
            status = ?result.status,
            candidates = result.candidates.len(),
            diagnostics = result.diagnostics.len(),
            "Request resolved"
        );
        result
    }
}

/// Merge per-source outcomes into a classified, ranked result
pub fn assemble_result(request: LookupRequest, outcomes: Vec<SourceOutcome>) -> LookupResult {
    let mut candidates = Vec::new();
    let mut diagnostics = Vec::new();
    let mut source_failed = false;

    for outcome in outcomes {
        match outcome.result {
            Ok(found) if found.is_empty() => {
                diagnostics.push(Diagnostic::warning(outcome.source, "no matching artwork found"));
            }
            Ok(found) => {
                if let Some(album) = request.album_filter() {
                    if found.iter().all(|c| c.relevance == Relevance::Deprioritized) {
                        diagnostics.push(Diagnostic::warning(
                            outcome.source,
                            format!("no candidate matched album \"{}\"", album),
                        ));
                    }
                }
                candidates.extend(found);
            }
            Err(error) => {
                source_failed = true;
                diagnostics.push(Diagnostic::from_source_error(outcome.source, &error));
            }
        }
    }

    let candidates = rank_candidates(candidates);
    let status = if candidates.is_empty() {
        LookupStatus::Failed
    } else if source_failed {
        LookupStatus::PartiallyResolved
    } else {
        LookupStatus::Resolved
    };

    LookupResult {
        request,
        status,
        candidates,
        diagnostics,
    }
}

/// Display order: Catalog-A before Catalog-B; within a source, candidates
/// that failed the album filter last, then larger images first, then better
/// text matches. Duplicate entities per source are dropped (first kept).
pub fn rank_candidates(mut candidates: Vec<ArtworkCandidate>) -> Vec<ArtworkCandidate> {
    candidates.sort_by_key(|c| {
        (
            c.source.display_rank(),
            c.relevance == Relevance::Deprioritized,
            Reverse(c.resolution.area()),
            Reverse(c.relevance),
        )
    });

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert((c.source, c.source_entity_id.clone())));
    candidates
}
