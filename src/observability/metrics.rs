//! Metrics registry
//!
//! Counters only, monotonic, reset on process start. Relaxed ordering: the
//! counters are reporting aids and never gate behavior.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for compilation and cursor management
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    compilations: AtomicU64,
    degraded_compilations: AtomicU64,
    searches: AtomicU64,
    continuations: AtomicU64,
    releases: AtomicU64,
    release_failures: AtomicU64,
    pager_expiries: AtomicU64,
    pager_rejections: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished compilation; `degraded` when SupportFlag is false
    pub fn record_compilation(&self, degraded: bool) {
        self.compilations.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded_compilations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_searches(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_continuations(&self) {
        self.continuations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_releases(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_release_failures(&self) {
        self.release_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pager_expiries(&self) {
        self.pager_expiries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pager_rejections(&self) {
        self.pager_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            compilations: self.compilations.load(Ordering::Relaxed),
            degraded_compilations: self.degraded_compilations.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            continuations: self.continuations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
            pager_expiries: self.pager_expiries.load(Ordering::Relaxed),
            pager_rejections: self.pager_rejections.load(Ordering::Relaxed),
        }
    }

    /// Current values as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub compilations: u64,
    pub degraded_compilations: u64,
    pub searches: u64,
    pub continuations: u64,
    pub releases: u64,
    pub release_failures: u64,
    pub pager_expiries: u64,
    pub pager_rejections: u64,
}
