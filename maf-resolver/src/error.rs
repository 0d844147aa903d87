//! Error types for maf-resolver
//!
//! Three families:
//! - [`ValidationError`]: bad input, reported per request, never retried
//! - [`SourceError`]: one catalog call failed; retried by the controller and
//!   finally turned into a diagnostic
//! - internal faults: panics caught at the per-request boundary by the
//!   orchestrator (no type, they become a `Failed` result)

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Local request validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("artist required")]
    MissingArtist,
}

/// Classification of a failed source call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceErrorKind {
    /// Source cannot serve this query kind; no network call was made
    Unsupported,
    /// Credentials rejected, or token rejected again after re-exchange
    AuthFailed,
    /// HTTP 429
    RateLimited,
    /// Per-call ceiling hit or transport timeout
    Timeout,
    /// Connection-level failure other than a timeout
    Network,
    /// Source suppressed after repeated failures, or not configured
    Suppressed,
    /// HTTP 5xx
    ServerError,
    /// HTTP 4xx other than 429
    ClientError,
    /// Response body could not be understood
    InvalidResponse,
}

impl SourceErrorKind {
    /// Whether an exhausted failure of this kind counts against source health
    pub fn counts_against_health(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::Network | Self::ServerError | Self::AuthFailed
        )
    }
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unsupported => "unsupported",
            Self::AuthFailed => "authentication failed",
            Self::RateLimited => "rate limited",
            Self::Timeout => "timed out",
            Self::Network => "network error",
            Self::Suppressed => "suppressed",
            Self::ServerError => "server error",
            Self::ClientError => "client error",
            Self::InvalidResponse => "invalid response",
        };
        f.write_str(label)
    }
}

/// Failure of a single source call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub http_status: Option<u16>,
    pub message: String,
    pub retryable: bool,
    /// Server-requested wait (Retry-After), when given
    pub retry_after: Option<Duration>,
}

impl SourceError {
    fn new(
        kind: SourceErrorKind,
        http_status: Option<u16>,
        message: String,
        retryable: bool,
    ) -> Self {
        Self {
            kind,
            http_status,
            message,
            retryable,
            retry_after: None,
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unsupported, None, message.into(), false)
    }

    pub fn auth_failed(http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::AuthFailed, http_status, message.into(), false)
    }

    pub fn rate_limited(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            retry_after,
            ..Self::new(SourceErrorKind::RateLimited, Some(429), message.into(), true)
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, None, message.into(), true)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Network, None, message.into(), true)
    }

    pub fn server_error(http_status: u16, message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ServerError, Some(http_status), message.into(), true)
    }

    pub fn client_error(http_status: u16, message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ClientError, Some(http_status), message.into(), false)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidResponse, None, message.into(), false)
    }

    /// Suppressed for `remaining`; `None` means permanently (not configured)
    pub fn suppressed(remaining: Option<Duration>) -> Self {
        match remaining {
            Some(remaining) => Self::new(
                SourceErrorKind::Suppressed,
                None,
                format!(
                    "skipped after repeated failures, retry in {}s",
                    remaining.as_secs().max(1)
                ),
                true,
            ),
            None => Self::new(
                SourceErrorKind::Suppressed,
                None,
                "source not configured".to_string(),
                false,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_flags() {
        assert!(SourceError::rate_limited(None, "slow down").retryable);
        assert!(SourceError::timeout("t").retryable);
        assert!(SourceError::server_error(503, "down").retryable);
        assert!(!SourceError::client_error(404, "missing").retryable);
        assert!(!SourceError::unsupported("no artist photos").retryable);
        assert!(!SourceError::auth_failed(Some(401), "bad secret").retryable);
        assert!(SourceError::suppressed(Some(Duration::from_secs(60))).retryable);
        assert!(!SourceError::suppressed(None).retryable);
    }

    #[test]
    fn test_health_accounting_kinds() {
        assert!(SourceErrorKind::ServerError.counts_against_health());
        assert!(SourceErrorKind::AuthFailed.counts_against_health());
        assert!(!SourceErrorKind::ClientError.counts_against_health());
        assert!(!SourceErrorKind::Unsupported.counts_against_health());
        assert!(!SourceErrorKind::Suppressed.counts_against_health());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = SourceError::rate_limited(Some(Duration::from_secs(2)), "HTTP 429");
        assert_eq!(err.to_string(), "rate limited: HTTP 429");
        assert_eq!(err.http_status, Some(429));
        assert_eq!(ValidationError::MissingArtist.to_string(), "artist required");
    }
}
