// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render-cycle and async-task metrics for a single session.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Atomic, cheaply-shareable per-session metrics.
pub struct SessionMetrics {
    renders_total: AtomicU64,
    patch_ops_total: AtomicU64,
    async_tasks_spawned: AtomicU64,
    async_tasks_resolved: AtomicU64,
    async_tasks_failed: AtomicU64,
    cumulative_render_micros: AtomicU64,
}

impl SessionMetrics {
    /// A new, zero-initialized metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            renders_total: AtomicU64::new(0),
            patch_ops_total: AtomicU64::new(0),
            async_tasks_spawned: AtomicU64::new(0),
            async_tasks_resolved: AtomicU64::new(0),
            async_tasks_failed: AtomicU64::new(0),
            cumulative_render_micros: AtomicU64::new(0),
        }
    }

    /// Record a render cycle that produced `op_count` compressed patch
    /// operations and took `elapsed_micros`.
    pub fn record_render(&self, op_count: u64, elapsed_micros: u64) {
        self.renders_total.fetch_add(1, Relaxed);
        self.patch_ops_total.fetch_add(op_count, Relaxed);
        self.cumulative_render_micros.fetch_add(elapsed_micros, Relaxed);
    }

    /// Record that an `assign_async` producer was spawned.
    pub fn record_async_spawned(&self) {
        self.async_tasks_spawned.fetch_add(1, Relaxed);
    }

    /// Record an `assign_async` producer's resolution.
    pub fn record_async_resolved(&self, failed: bool) {
        self.async_tasks_resolved.fetch_add(1, Relaxed);
        if failed {
            self.async_tasks_failed.fetch_add(1, Relaxed);
        }
    }

    /// A point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let renders_total = self.renders_total.load(Relaxed);
        let average_render_micros = if renders_total == 0 {
            0
        } else {
            self.cumulative_render_micros.load(Relaxed) / renders_total
        };
        MetricsSnapshot {
            renders_total,
            patch_ops_total: self.patch_ops_total.load(Relaxed),
            async_tasks_spawned: self.async_tasks_spawned.load(Relaxed),
            async_tasks_resolved: self.async_tasks_resolved.load(Relaxed),
            async_tasks_failed: self.async_tasks_failed.load(Relaxed),
            average_render_micros,
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-atomic, serializable snapshot of [`SessionMetrics`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total render cycles run.
    pub renders_total: u64,
    /// Cumulative compressed patch operations emitted.
    pub patch_ops_total: u64,
    /// Total `assign_async` producers spawned.
    pub async_tasks_spawned: u64,
    /// Total producers that reached a terminal outcome.
    pub async_tasks_resolved: u64,
    /// Of those, how many failed.
    pub async_tasks_failed: u64,
    /// Running average render duration, in microseconds.
    pub average_render_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_zeroed() {
        let metrics = SessionMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.renders_total, 0);
        assert_eq!(snap.average_render_micros, 0);
    }

    #[test]
    fn record_render_updates_average() {
        let metrics = SessionMetrics::new();
        metrics.record_render(3, 100);
        metrics.record_render(1, 300);
        let snap = metrics.snapshot();
        assert_eq!(snap.renders_total, 2);
        assert_eq!(snap.patch_ops_total, 4);
        assert_eq!(snap.average_render_micros, 200);
    }

    #[test]
    fn record_async_resolved_tracks_failures() {
        let metrics = SessionMetrics::new();
        metrics.record_async_spawned();
        metrics.record_async_resolved(true);
        let snap = metrics.snapshot();
        assert_eq!(snap.async_tasks_spawned, 1);
        assert_eq!(snap.async_tasks_resolved, 1);
        assert_eq!(snap.async_tasks_failed, 1);
    }
}
