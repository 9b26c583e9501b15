//! Metrics for filter manager operations
//!
//! Thread-safe counters updated on every insertion, peer message and
//! resize. Read them through [`FilterMetrics::snapshot`].
//!
//! ## Usage
//!
//! ```ignore
//! let snapshot = manager.metrics().snapshot();
//! println!("{}", serde_json::to_string(&snapshot)?);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for the filter manager
#[derive(Debug, Default)]
pub struct FilterMetrics {
    /// Elements inserted into any live filter, replays included
    pub elements_inserted: AtomicU64,
    /// `filteradd` messages handed to the peer group
    pub filteradds_sent: AtomicU64,
    /// `filterload` messages handed to the peer group
    pub filterloads_sent: AtomicU64,
    /// Completed resizes, the initial build included
    pub resizes: AtomicU64,
    /// Resizes that failed and were rolled back
    pub resizes_failed: AtomicU64,
    /// Filterables registered
    pub filterables_registered: AtomicU64,
    /// Errors raised on the event channel
    pub errors_raised: AtomicU64,
    /// Size in bytes of the current filter
    pub filter_bytes: AtomicU64,
}

impl FilterMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserts(&self, count: usize) {
        self.elements_inserted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_filteradd(&self) {
        self.filteradds_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filterload(&self) {
        self.filterloads_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed resize
    ///
    /// # Arguments
    /// * `size_bytes` - Size of the filter now live
    pub fn record_resize(&self, size_bytes: usize) {
        self.resizes.fetch_add(1, Ordering::Relaxed);
        self.filter_bytes.store(size_bytes as u64, Ordering::Relaxed);
    }

    pub fn record_resize_failed(&self) {
        self.resizes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filterable(&self) {
        self.filterables_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_raised.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elements_inserted: self.elements_inserted.load(Ordering::Relaxed),
            filteradds_sent: self.filteradds_sent.load(Ordering::Relaxed),
            filterloads_sent: self.filterloads_sent.load(Ordering::Relaxed),
            resizes: self.resizes.load(Ordering::Relaxed),
            resizes_failed: self.resizes_failed.load(Ordering::Relaxed),
            filterables_registered: self.filterables_registered.load(Ordering::Relaxed),
            errors_raised: self.errors_raised.load(Ordering::Relaxed),
            filter_bytes: self.filter_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub elements_inserted: u64,
    pub filteradds_sent: u64,
    pub filterloads_sent: u64,
    pub resizes: u64,
    pub resizes_failed: u64,
    pub filterables_registered: u64,
    pub errors_raised: u64,
    pub filter_bytes: u64,
}
