//! Counters for ingestion and conversion activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Engine metrics.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Batches fully ingested.
    pub batches_ingested: AtomicU64,
    /// Batches that stopped on an error.
    pub batches_failed: AtomicU64,
    /// Individual rates upserted, including those of failed batches.
    pub rates_written: AtomicU64,
    /// Successful conversions.
    pub conversions: AtomicU64,
    /// Successful rebases.
    pub rebases: AtomicU64,
}

impl EngineMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed batch.
    pub fn batch_ingested(&self, rates: usize) {
        self.batches_ingested.fetch_add(1, Ordering::Relaxed);
        self.rates_written.fetch_add(rates as u64, Ordering::Relaxed);
    }

    /// Record an aborted batch and the rates it wrote before stopping.
    pub fn batch_failed(&self, rates_written: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.rates_written
            .fetch_add(rates_written as u64, Ordering::Relaxed);
    }

    pub fn conversion(&self) {
        self.conversions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rebase(&self) {
        self.rebases.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_ingested: self.batches_ingested.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            rates_written: self.rates_written.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
            rebases: self.rebases.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot for logging or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub batches_ingested: u64,
    pub batches_failed: u64,
    pub rates_written: u64,
    pub conversions: u64,
    pub rebases: u64,
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<EngineMetrics>;
