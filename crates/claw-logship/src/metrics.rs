//! Delivery counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by the appender and its write executor.
///
/// Readable without taking the appender lock.
#[derive(Debug, Default)]
pub struct ShipperMetrics {
    events_appended: AtomicU64,
    events_rejected: AtomicU64,
    batches_written: AtomicU64,
    items_written: AtomicU64,
    collections_created: AtomicU64,
    client_errors: AtomicU64,
    batches_dropped: AtomicU64,
    items_dropped: AtomicU64,
}

/// Point-in-time copy of [`ShipperMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Events accepted by `append`
    pub events_appended: u64,
    /// Events refused because the appender was closed
    pub events_rejected: u64,
    /// Batches acknowledged by the store
    pub batches_written: u64,
    /// Items acknowledged by the store
    pub items_written: u64,
    /// Collections created on demand
    pub collections_created: u64,
    /// Client errors reported to the error handler
    pub client_errors: u64,
    /// Batches dropped after exhausting retries
    pub batches_dropped: u64,
    /// Items dropped after exhausting retries
    pub items_dropped: u64,
}

impl ShipperMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_appended(&self) {
        self.events_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self, items: usize) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.items_written.fetch_add(items as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_collection_created(&self) {
        self.collections_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_client_error(&self) {
        self.client_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, items: usize) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.items_dropped.fetch_add(items as u64, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_appended: self.events_appended.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            items_written: self.items_written.load(Ordering::Relaxed),
            collections_created: self.collections_created.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Serializes the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
