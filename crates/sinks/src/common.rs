//! Common types shared by all sinks

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use silo_metrics::{SinkMetricsProvider, SinkMetricsSnapshot};
use thiserror::Error;

/// Classified sink write failure
///
/// The retry decision is a pure function of the variant: `is_retryable`
/// returns true for transient conditions (the worker retries the same block
/// with backoff) and false for conditions retry cannot fix (the partition
/// faults and the block is reported lost-in-flight, checkpoint unchanged).
#[derive(Debug, Error)]
pub enum SinkError {
    /// The write attempt timed out
    #[error("write timed out")]
    Timeout,

    /// The destination asked us to slow down (HTTP 429 and friends)
    #[error("destination throttled the write")]
    Throttled,

    /// Could not reach the destination
    #[error("connection failure: {0}")]
    Connection(String),

    /// Local or remote I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error status outside the specific cases above
    #[error("http status {status}")]
    HttpStatus { status: u16 },

    /// The destination rejected the block's content (mapping conflict,
    /// malformed document); retrying the same bytes cannot succeed
    #[error("destination rejected block: {0}")]
    Rejected(String),

    /// The destination (index, container) does not exist
    #[error("destination not found: {0}")]
    NotFound(String),

    /// Authentication/authorization failure
    #[error("authentication failure: {0}")]
    Auth(String),

    /// The block itself is unusable (e.g. undecodable frames)
    #[error("invalid block: {0}")]
    InvalidBlock(String),
}

impl SinkError {
    /// Whether the same write may succeed if retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Throttled | Self::Connection(_) | Self::Io(_) => true,
            Self::HttpStatus { status } => *status >= 500,
            Self::Rejected(_) | Self::NotFound(_) | Self::Auth(_) | Self::InvalidBlock(_) => false,
        }
    }
}

/// Lock-free counters shared by all sink types
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Blocks successfully written
    pub blocks_written: AtomicU64,

    /// Frames contained in written blocks
    pub frames_written: AtomicU64,

    /// Bytes successfully written
    pub bytes_written: AtomicU64,

    /// Failed write calls
    pub write_errors: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            blocks_written: AtomicU64::new(0),
            frames_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Record a successfully written block
    #[inline]
    pub fn block_written(&self, frames: u64, bytes: u64) {
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        self.frames_written.fetch_add(frames, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a failed write call
    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Provider handle for the unified reporter
///
/// Holds an `Arc` to the writer's counters, so it stays valid for the whole
/// run regardless of who owns the writer.
#[derive(Clone)]
pub struct SinkMetricsHandle {
    id: String,
    sink_type: &'static str,
    metrics: Arc<SinkMetrics>,
}

impl SinkMetricsHandle {
    /// Create a handle over shared counters
    pub fn new(id: impl Into<String>, sink_type: &'static str, metrics: Arc<SinkMetrics>) -> Self {
        Self {
            id: id.into(),
            sink_type,
            metrics,
        }
    }
}

impl SinkMetricsProvider for SinkMetricsHandle {
    fn sink_id(&self) -> String {
        self.id.clone()
    }

    fn sink_type(&self) -> &'static str {
        self.sink_type
    }

    fn snapshot(&self) -> SinkMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
