//! Worker metrics - lock-free counters per partition
//!
//! Counters survive worker restarts: the registry hands out the same `Arc`
//! for a partition across respawns, so the reporter sees one continuous
//! series per partition rather than a reset on every fault.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use silo_metrics::{WorkerMetricsProvider, WorkerMetricsSnapshot};
use silo_protocol::PartitionId;

/// Counters for one partition worker
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Events pulled from the transport
    pub events_received: AtomicU64,
    /// Frames appended to the buffer
    pub frames_appended: AtomicU64,
    /// Events dropped because their frame exceeds the buffer capacity
    pub frames_oversized: AtomicU64,
    /// Blocks durably written
    pub blocks_flushed: AtomicU64,
    /// Bytes durably written
    pub bytes_flushed: AtomicU64,
    /// Write attempts beyond the first
    pub flush_retries: AtomicU64,
    /// Blocks abandoned (fatal error or retries exhausted)
    pub blocks_failed: AtomicU64,
    /// Checkpoint advances persisted
    pub checkpoints_advanced: AtomicU64,
    /// Failed checkpoint persist attempts
    pub checkpoint_failures: AtomicU64,
}

impl WorkerMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            frames_appended: AtomicU64::new(0),
            frames_oversized: AtomicU64::new(0),
            blocks_flushed: AtomicU64::new(0),
            bytes_flushed: AtomicU64::new(0),
            flush_retries: AtomicU64::new(0),
            blocks_failed: AtomicU64::new(0),
            checkpoints_advanced: AtomicU64::new(0),
            checkpoint_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn frame_appended(&self) {
        self.frames_appended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn frame_oversized(&self) {
        self.frames_oversized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn block_flushed(&self, bytes: u64) {
        self.blocks_flushed.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn flush_retry(&self) {
        self.flush_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn block_failed(&self) {
        self.blocks_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn checkpoint_advanced(&self) {
        self.checkpoints_advanced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn checkpoint_failure(&self) {
        self.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> WorkerMetricsSnapshot {
        WorkerMetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            frames_appended: self.frames_appended.load(Ordering::Relaxed),
            frames_oversized: self.frames_oversized.load(Ordering::Relaxed),
            blocks_flushed: self.blocks_flushed.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            flush_retries: self.flush_retries.load(Ordering::Relaxed),
            blocks_failed: self.blocks_failed.load(Ordering::Relaxed),
            checkpoints_advanced: self.checkpoints_advanced.load(Ordering::Relaxed),
            checkpoint_failures: self.checkpoint_failures.load(Ordering::Relaxed),
        }
    }
}

/// Provider handle for the unified reporter
#[derive(Clone)]
pub struct WorkerMetricsHandle {
    partition: PartitionId,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerMetricsHandle {
    /// Create a handle over shared counters
    pub fn new(partition: PartitionId, metrics: Arc<WorkerMetrics>) -> Self {
        Self { partition, metrics }
    }
}

impl WorkerMetricsProvider for WorkerMetricsHandle {
    fn partition(&self) -> String {
        self.partition.to_string()
    }

    fn snapshot(&self) -> WorkerMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Get-or-create registry of per-partition worker counters
///
/// The coordinator pulls from here when (re)spawning a worker; the host pulls
/// from here when registering reporter providers. Both see the same `Arc`.
#[derive(Debug, Default)]
pub struct WorkerMetricsRegistry {
    inner: Mutex<HashMap<PartitionId, Arc<WorkerMetrics>>>,
}

impl WorkerMetricsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters for `partition`, created on first use
    pub fn metrics_for(&self, partition: PartitionId) -> Arc<WorkerMetrics> {
        let mut inner = self.inner.lock().expect("metrics registry lock poisoned");
        Arc::clone(
            inner
                .entry(partition)
                .or_insert_with(|| Arc::new(WorkerMetrics::new())),
        )
    }

    /// A reporter provider handle for `partition`
    pub fn handle_for(&self, partition: PartitionId) -> WorkerMetricsHandle {
        WorkerMetricsHandle::new(partition, self.metrics_for(partition))
    }
}
