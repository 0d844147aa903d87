//! Configuration for maf-resolver
//!
//! Loaded from TOML (see `maf_common::config` for file discovery). Every
//! section has defaults, so an empty or missing file is valid.
//!
//! Catalog-A credentials resolve per field with ENV → TOML priority.
//! Missing credentials are not an error: Catalog-A is then permanently
//! suppressed and lookups run against Catalog-B only.

use crate::controller::{GuardedSource, RetryPolicy};
use crate::engine::ResolutionEngine;
use crate::health::{HealthBoard, SuppressionPolicy};
use crate::model::SourceId;
use crate::orchestrator::{effective_concurrency, BatchOrchestrator, DEFAULT_MAX_CONCURRENCY};
use crate::sources::{
    catalog_a, catalog_b, CatalogAClient, CatalogACredentials, CatalogASettings, CatalogBClient,
    CatalogBSettings,
};
use maf_common::config::{load_toml_config, resolve_config_path, resolve_setting, LoggingConfig};
use maf_common::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Module name used for the default config file location
pub const MODULE_NAME: &str = "maf-resolver";

/// Checked in order; the first non-blank value wins
pub const CLIENT_ID_ENV_VARS: [&str; 2] = ["MAF_CATALOG_A_CLIENT_ID", "SPOTIFY_CLIENT_ID"];
pub const CLIENT_SECRET_ENV_VARS: [&str; 2] =
    ["MAF_CATALOG_A_CLIENT_SECRET", "SPOTIFY_CLIENT_SECRET"];

/// `[catalog_a]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogAConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub search_url: String,
    pub result_limit: u32,
    pub market: Option<String>,
    /// Pacing ceiling; unset or 0 disables pacing
    pub requests_per_minute: Option<u32>,
    pub connect_timeout_ms: u64,
}

impl Default for CatalogAConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: catalog_a::DEFAULT_AUTH_URL.to_string(),
            search_url: catalog_a::DEFAULT_SEARCH_URL.to_string(),
            result_limit: 5,
            market: None,
            requests_per_minute: None,
            connect_timeout_ms: 5000,
        }
    }
}

/// `[catalog_b]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogBConfig {
    pub search_url: String,
    pub result_limit: u32,
    pub country: Option<String>,
    pub artwork_size: String,
    /// The public endpoint allows roughly 20 calls per minute
    pub requests_per_minute: Option<u32>,
    pub connect_timeout_ms: u64,
}

impl Default for CatalogBConfig {
    fn default() -> Self {
        Self {
            search_url: catalog_b::DEFAULT_SEARCH_URL.to_string(),
            result_limit: 5,
            country: None,
            artwork_size: catalog_b::DEFAULT_ARTWORK_SIZE.to_string(),
            requests_per_minute: Some(20),
            connect_timeout_ms: 5000,
        }
    }
}

/// `[retry]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub factor: f64,
    pub jitter: f64,
    pub rate_limit_retries: u32,
    pub server_error_retries: u32,
    pub call_timeout_ms: u64,
    pub max_retry_after_ms: u64,
    pub failure_threshold: u32,
    pub suppression_base_secs: u64,
    pub suppression_cap_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            factor: 2.0,
            jitter: 0.2,
            rate_limit_retries: 2,
            server_error_retries: 1,
            call_timeout_ms: 10_000,
            max_retry_after_ms: 10_000,
            failure_threshold: 3,
            suppression_base_secs: 60,
            suppression_cap_secs: 600,
        }
    }
}

/// `[batch]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Complete resolver configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub catalog_a: CatalogAConfig,
    pub catalog_b: CatalogBConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

/// Everything needed to run lookups, built from a [`ResolverConfig`]
pub struct ResolverRuntime {
    pub health: HealthBoard,
    pub engine: Arc<ResolutionEngine>,
    pub orchestrator: BatchOrchestrator,
    pub max_concurrency: usize,
}

impl ResolverConfig {
    /// Locate and load the config file (CLI path → `MAF_CONFIG` → default
    /// location → built-in defaults), then validate it.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, MODULE_NAME);
        let config: Self = load_toml_config(path.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the resolver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.catalog_a.result_limit == 0 || self.catalog_a.result_limit > 50 {
            return Err(Error::Config(format!(
                "catalog_a.result_limit must be 1..=50, got {}",
                self.catalog_a.result_limit
            )));
        }
        if self.catalog_b.result_limit == 0 || self.catalog_b.result_limit > 200 {
            return Err(Error::Config(format!(
                "catalog_b.result_limit must be 1..=200, got {}",
                self.catalog_b.result_limit
            )));
        }
        if self.retry.factor.is_nan() || self.retry.factor < 1.0 {
            return Err(Error::Config(format!(
                "retry.factor must be >= 1.0, got {}",
                self.retry.factor
            )));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(Error::Config(format!(
                "retry.jitter must be within 0.0..=1.0, got {}",
                self.retry.jitter
            )));
        }
        if self.retry.call_timeout_ms == 0 {
            return Err(Error::Config("retry.call_timeout_ms must be positive".to_string()));
        }
        if self.retry.failure_threshold == 0 {
            return Err(Error::Config(
                "retry.failure_threshold must be positive".to_string(),
            ));
        }
        if self.retry.suppression_cap_secs < self.retry.suppression_base_secs {
            return Err(Error::Config(format!(
                "retry.suppression_cap_secs ({}) is below suppression_base_secs ({})",
                self.retry.suppression_cap_secs, self.retry.suppression_base_secs
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.retry;
        RetryPolicy {
            base_delay: Duration::from_millis(retry.base_delay_ms),
            factor: retry.factor,
            jitter: retry.jitter,
            rate_limit_retries: retry.rate_limit_retries,
            server_error_retries: retry.server_error_retries,
            call_timeout: Duration::from_millis(retry.call_timeout_ms),
            max_retry_after: Duration::from_millis(retry.max_retry_after_ms),
            suppression: SuppressionPolicy {
                failure_threshold: retry.failure_threshold,
                base_window: Duration::from_secs(retry.suppression_base_secs),
                max_window: Duration::from_secs(retry.suppression_cap_secs),
            },
        }
    }

    /// Batch concurrency, clamped to the supported range
    pub fn max_concurrency(&self) -> usize {
        effective_concurrency(self.batch.max_concurrency)
    }

    /// Resolve Catalog-A credentials (ENV → TOML). `None` unless both the
    /// id and the secret are available.
    pub fn catalog_a_credentials(&self) -> Option<CatalogACredentials> {
        let client_id = resolve_setting(
            "Catalog-A client id",
            &CLIENT_ID_ENV_VARS,
            self.catalog_a.client_id.as_deref(),
        );
        let client_secret = resolve_setting(
            "Catalog-A client secret",
            &CLIENT_SECRET_ENV_VARS,
            self.catalog_a.client_secret.as_deref(),
        );

        match (client_id, client_secret) {
            (Some(id), Some(secret)) => {
                info!(
                    id_origin = ?id.origin,
                    secret_origin = ?secret.origin,
                    "Catalog-A credentials loaded"
                );
                Some(CatalogACredentials {
                    client_id: id.value,
                    client_secret: secret.value,
                })
            }
            (None, None) => None,
            (id, _) => {
                tracing::warn!(
                    missing = if id.is_none() { "client id" } else { "client secret" },
                    "Incomplete Catalog-A credentials, ignoring them"
                );
                None
            }
        }
    }

    pub fn catalog_a_settings(&self) -> CatalogASettings {
        CatalogASettings {
            auth_url: self.catalog_a.auth_url.clone(),
            search_url: self.catalog_a.search_url.clone(),
            result_limit: self.catalog_a.result_limit,
            market: self.catalog_a.market.clone(),
            connect_timeout: Duration::from_millis(self.catalog_a.connect_timeout_ms),
        }
    }

    pub fn catalog_b_settings(&self) -> CatalogBSettings {
        CatalogBSettings {
            search_url: self.catalog_b.search_url.clone(),
            result_limit: self.catalog_b.result_limit,
            country: self.catalog_b.country.clone(),
            artwork_size: self.catalog_b.artwork_size.clone(),
            connect_timeout: Duration::from_millis(self.catalog_b.connect_timeout_ms),
        }
    }

    /// Build adapters, health records, controllers, engine and orchestrator
    pub fn build_runtime(&self) -> Result<ResolverRuntime> {
        let credentials = self.catalog_a_credentials();
        let health = if credentials.is_some() {
            HealthBoard::new()
        } else {
            tracing::warn!("Catalog-A credentials not configured; using Catalog-B only");
            HealthBoard::with_disabled(&[SourceId::CatalogA])
        };

        let policy = self.retry_policy();
        let catalog_a = CatalogAClient::new(self.catalog_a_settings(), credentials)?;
        let catalog_b = CatalogBClient::new(self.catalog_b_settings())?;

        let engine = Arc::new(ResolutionEngine::new(
            GuardedSource::new(
                Arc::new(catalog_a),
                health.get(SourceId::CatalogA).clone(),
                policy.clone(),
            )
            .with_pacing(self.catalog_a.requests_per_minute),
            GuardedSource::new(
                Arc::new(catalog_b),
                health.get(SourceId::CatalogB).clone(),
                policy,
            )
            .with_pacing(self.catalog_b.requests_per_minute),
        ));

        Ok(ResolverRuntime {
            orchestrator: BatchOrchestrator::new(engine.clone()),
            health,
            engine,
            max_concurrency: self.max_concurrency(),
        })
    }
}
