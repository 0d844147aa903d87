//! # maf-resolver
//!
//! Artwork Resolution Engine for the music artwork finder. Takes ordered
//! batches of artist (+ track/album) lookups and resolves each into ranked
//! artwork candidates from two independent catalogs:
//! - Catalog-A: token-authenticated (Spotify Web API compatible)
//! - Catalog-B: unauthenticated keyword search (iTunes Search API compatible)
//!
//! Layers, bottom up: source adapters (`sources`), the Rate/Retry Controller
//! (`controller`) with per-source health (`health`), the Resolution Engine
//! (`engine`) and the Batch Orchestrator (`orchestrator`).

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod health;
pub mod matching;
pub mod model;
pub mod orchestrator;
pub mod sources;

pub use config::{ResolverConfig, ResolverRuntime};
pub use controller::{GuardedSource, RetryPolicy};
pub use engine::{ResolutionEngine, Resolve};
pub use error::{SourceError, SourceErrorKind, ValidationError};
pub use health::{HealthBoard, HealthSnapshot, SourceHealth, SuppressionPolicy};
pub use model::{
    ArtworkCandidate, ArtworkKind, BatchSummary, Diagnostic, LookupRequest, LookupResult,
    LookupStatus, QueryKind, Relevance, ReleaseKind, Resolution, SourceId,
};
pub use orchestrator::BatchOrchestrator;
pub use sources::ArtworkSource;
