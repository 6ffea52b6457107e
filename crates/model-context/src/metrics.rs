//! Counters for store operations.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Store operation metrics (thread-safe counters, shared on clone).
#[derive(Debug, Clone, Default)]
pub struct StoreMetrics {
    /// Lazy namespaces computed
    pub lazy_computations: Arc<AtomicU64>,
    /// Memoized lazy namespaces dropped
    pub lazy_invalidations: Arc<AtomicU64>,
    /// Merges applied into this store
    pub merges: Arc<AtomicU64>,
}

impl StoreMetrics {
    /// Record a completed lazy computation.
    pub fn record_lazy_computation(&self) {
        self.lazy_computations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped lazy memo.
    pub fn record_lazy_invalidation(&self) {
        self.lazy_invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a merge.
    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            lazy_computations: self.lazy_computations.load(Ordering::Relaxed),
            lazy_invalidations: self.lazy_invalidations.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of store metrics (for reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetricsSnapshot {
    pub lazy_computations: u64,
    pub lazy_invalidations: u64,
    pub merges: u64,
}
