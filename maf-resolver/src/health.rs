//! Per-source health tracking and suppression
//!
//! One [`SourceHealth`] record exists per catalog for the lifetime of a
//! [`HealthBoard`]. Reads are lock-free atomic loads; writes happen only
//! through the Rate/Retry Controller (`record_success` / `record_failure` are
//! crate-private).
//!
//! Deadlines are stored as milliseconds since the record's creation on the
//! tokio clock, so paused-time tests observe suppression windows exactly.

use crate::model::SourceId;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// No suppression deadline
const NOT_SUPPRESSED: u64 = 0;
/// Suppressed for the lifetime of the record (source not configured)
const PERMANENT: u64 = u64::MAX;
/// Doubling stops here; the cap applies long before
const MAX_TRIP_EXPONENT: u32 = 16;

/// When and for how long a failing source gets suppressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionPolicy {
    /// Consecutive exhausted failures that trip suppression
    pub failure_threshold: u32,
    /// First suppression window
    pub base_window: Duration,
    /// Longest suppression window
    pub max_window: Duration,
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_window: Duration::from_secs(60),
            max_window: Duration::from_secs(600),
        }
    }
}

impl SuppressionPolicy {
    /// Window for the `trip`-th consecutive trip (0-based): base, 2x, 4x, ... capped
    pub fn window_for_trip(&self, trip: u32) -> Duration {
        let multiplier = 1u32 << trip.min(MAX_TRIP_EXPONENT);
        self.base_window
            .checked_mul(multiplier)
            .unwrap_or(self.max_window)
            .min(self.max_window)
    }
}

/// Point-in-time view of a source's health
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub source: SourceId,
    pub consecutive_failures: u32,
    /// Remaining suppression, `None` when reachable
    pub suppressed_for: Option<Duration>,
    pub permanently_suppressed: bool,
}

/// Health record for one source
#[derive(Debug)]
pub struct SourceHealth {
    source: SourceId,
    epoch: Instant,
    consecutive_failures: AtomicU32,
    trips: AtomicU32,
    suppressed_until_ms: AtomicU64,
}

impl SourceHealth {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            epoch: Instant::now(),
            consecutive_failures: AtomicU32::new(0),
            trips: AtomicU32::new(0),
            suppressed_until_ms: AtomicU64::new(NOT_SUPPRESSED),
        }
    }

    /// Record for a source that must never be called (e.g. no credentials)
    pub fn permanently_suppressed(source: SourceId) -> Self {
        let health = Self::new(source);
        health
            .suppressed_until_ms
            .store(PERMANENT, Ordering::Release);
        health
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX - 1)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn is_permanently_suppressed(&self) -> bool {
        self.suppressed_until_ms.load(Ordering::Acquire) == PERMANENT
    }

    /// Remaining suppression: `None` if reachable, `Some(Duration::MAX)` if
    /// permanently suppressed.
    pub fn suppression_remaining(&self) -> Option<Duration> {
        match self.suppressed_until_ms.load(Ordering::Acquire) {
            NOT_SUPPRESSED => None,
            PERMANENT => Some(Duration::MAX),
            deadline => {
                let now = self.now_ms();
                (deadline > now).then(|| Duration::from_millis(deadline - now))
            }
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppression_remaining().is_some()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let permanently_suppressed = self.is_permanently_suppressed();
        HealthSnapshot {
            source: self.source,
            consecutive_failures: self.consecutive_failures(),
            suppressed_for: if permanently_suppressed {
                None
            } else {
                self.suppression_remaining()
            },
            permanently_suppressed,
        }
    }

    /// A call succeeded: forget failures and lift suppression
    pub(crate) fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.trips.store(0, Ordering::Release);

        let mut current = self.suppressed_until_ms.load(Ordering::Acquire);
        while current != PERMANENT && current != NOT_SUPPRESSED {
            match self.suppressed_until_ms.compare_exchange_weak(
                current,
                NOT_SUPPRESSED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// A call failed after exhausting retries.
    ///
    /// Returns the suppression window when this failure tripped suppression.
    /// Only the caller that moves the deadline from "reachable" to a new
    /// deadline counts as a trip, so concurrent failures do not inflate the
    /// window.
    pub(crate) fn record_failure(&self, policy: &SuppressionPolicy) -> Option<Duration> {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures < policy.failure_threshold {
            return None;
        }

        let now = self.now_ms();
        let mut current = self.suppressed_until_ms.load(Ordering::Acquire);
        loop {
            if current == PERMANENT || current > now {
                // Already suppressed by someone else
                return None;
            }

            let window = policy.window_for_trip(self.trips.load(Ordering::Acquire));
            let window_ms = u64::try_from(window.as_millis()).unwrap_or(PERMANENT - 1);
            let deadline = now.saturating_add(window_ms).min(PERMANENT - 1);

            match self.suppressed_until_ms.compare_exchange_weak(
                current,
                deadline,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.trips.fetch_add(1, Ordering::AcqRel);
                    return Some(window);
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Process-wide, explicitly owned health state for both catalogs
#[derive(Debug, Clone)]
pub struct HealthBoard {
    catalog_a: Arc<SourceHealth>,
    catalog_b: Arc<SourceHealth>,
}

impl HealthBoard {
    pub fn new() -> Self {
        Self {
            catalog_a: Arc::new(SourceHealth::new(SourceId::CatalogA)),
            catalog_b: Arc::new(SourceHealth::new(SourceId::CatalogB)),
        }
    }

    /// Board where the given sources are permanently unreachable
    pub fn with_disabled(disabled: &[SourceId]) -> Self {
        let record = |source: SourceId| {
            if disabled.contains(&source) {
                Arc::new(SourceHealth::permanently_suppressed(source))
            } else {
                Arc::new(SourceHealth::new(source))
            }
        };
        Self {
            catalog_a: record(SourceId::CatalogA),
            catalog_b: record(SourceId::CatalogB),
        }
    }

    pub fn get(&self, source: SourceId) -> &Arc<SourceHealth> {
        match source {
            SourceId::CatalogA => &self.catalog_a,
            SourceId::CatalogB => &self.catalog_b,
        }
    }

    pub fn snapshot(&self) -> Vec<HealthSnapshot> {
        SourceId::ALL
            .iter()
            .map(|source| self.get(*source).snapshot())
            .collect()
    }
}

impl Default for HealthBoard {
    fn default() -> Self {
        Self::new()
    }
}
