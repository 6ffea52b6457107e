//! Metrics and reporting for resolution runs.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Resolution metrics (thread-safe counters, shared on clone).
#[derive(Debug, Clone, Default)]
pub struct BuildMetrics {
    /// `resolve` calls started
    pub resolve_calls: Arc<AtomicU64>,
    /// Rounds executed across all calls
    pub rounds: Arc<AtomicU64>,
    /// Batch builder invocations
    pub builder_calls: Arc<AtomicU64>,
    /// Ids handed to batch builders
    pub requested_ids: Arc<AtomicU64>,
    /// Entries newly merged into contexts
    pub merged_values: Arc<AtomicU64>,
    /// Lazy declarations newly installed into contexts
    pub lazy_installs: Arc<AtomicU64>,
    /// Registrations seen after the builder was frozen
    pub conflicts: Arc<AtomicU64>,
}

impl BuildMetrics {
    pub fn record_resolve(&self) {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one builder call for `ids` ids.
    pub fn record_builder_call(&self, ids: usize) {
        self.builder_calls.fetch_add(1, Ordering::Relaxed);
        self.requested_ids.fetch_add(ids as u64, Ordering::Relaxed);
    }

    pub fn record_merged(&self, count: usize) {
        self.merged_values.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_lazy_install(&self) {
        self.lazy_installs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolve_calls: self.resolve_calls.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            builder_calls: self.builder_calls.load(Ordering::Relaxed),
            requested_ids: self.requested_ids.load(Ordering::Relaxed),
            merged_values: self.merged_values.load(Ordering::Relaxed),
            lazy_installs: self.lazy_installs.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.resolve_calls,
            &self.rounds,
            &self.builder_calls,
            &self.requested_ids,
            &self.merged_values,
            &self.lazy_installs,
            &self.conflicts,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of resolution metrics (for reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub resolve_calls: u64,
    pub rounds: u64,
    pub builder_calls: u64,
    pub requested_ids: u64,
    pub merged_values: u64,
    pub lazy_installs: u64,
    pub conflicts: u64,
}

impl MetricsSnapshot {
    /// Average rounds per `resolve` call.
    pub fn rounds_per_resolve(&self) -> f64 {
        if self.resolve_calls == 0 {
            return 0.0;
        }
        self.rounds as f64 / self.resolve_calls as f64
    }

    /// Average batch size handed to builders.
    pub fn average_batch_size(&self) -> f64 {
        if self.builder_calls == 0 {
            return 0.0;
        }
        self.requested_ids as f64 / self.builder_calls as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Model Builder Metrics Report".to_string());
        lines.push("=".repeat(50));
        lines.push("Resolution:".to_string());
        lines.push(format!("  Resolve calls:   {}", self.resolve_calls));
        lines.push(format!("  Rounds:          {}", self.rounds));
        lines.push(format!("  Rounds/resolve:  {:.2}", self.rounds_per_resolve()));
        lines.push(String::new());
        lines.push("Builders:".to_string());
        lines.push(format!("  Calls:           {}", self.builder_calls));
        lines.push(format!("  Requested ids:   {}", self.requested_ids));
        lines.push(format!("  Avg batch size:  {:.2}", self.average_batch_size()));
        lines.push(format!("  Merged values:   {}", self.merged_values));
        lines.push(String::new());
        lines.push("Configuration:".to_string());
        lines.push(format!("  Lazy installs:   {}", self.lazy_installs));
        lines.push(format!("  Late registrations: {}", self.conflicts));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_report() {
        let metrics = BuildMetrics::default();
        metrics.record_resolve();
        metrics.record_round();
        metrics.record_round();
        metrics.record_builder_call(3);
        metrics.record_builder_call(1);

        let snap = metrics.snapshot();
        assert_eq!(snap.rounds, 2);
        assert_eq!(snap.requested_ids, 4);
        assert!((snap.average_batch_size() - 2.0).abs() < f64::EPSILON);
        assert!(snap.format_report().contains("Requested ids:   4"));

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_empty_snapshot_ratios() {
        let snap = MetricsSnapshot::default();
        assert_eq!(snap.rounds_per_resolve(), 0.0);
        assert_eq!(snap.average_batch_size(), 0.0);
    }
}
