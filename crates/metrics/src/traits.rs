//! Metrics provider traits
//!
//! Workers and sinks implement these so the reporter can collect their
//! counters without knowing the concrete types. All providers are
//! `Send + Sync`; the underlying counters are atomics, so `snapshot()` never
//! blocks anything.

use serde::Serialize;

/// Point-in-time snapshot of one partition worker's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerMetricsSnapshot {
    /// Events pulled from the transport
    pub events_received: u64,
    /// Frames appended to the buffer
    pub frames_appended: u64,
    /// Events dropped because their frame exceeds the buffer capacity
    pub frames_oversized: u64,
    /// Blocks durably written to the sink
    pub blocks_flushed: u64,
    /// Total bytes durably written
    pub bytes_flushed: u64,
    /// Write attempts beyond the first, across all blocks
    pub flush_retries: u64,
    /// Blocks abandoned after retry exhaustion or a fatal sink error
    pub blocks_failed: u64,
    /// Checkpoint advances persisted
    pub checkpoints_advanced: u64,
    /// Checkpoint persist attempts that failed
    pub checkpoint_failures: u64,
}

/// Trait for partition workers to expose their metrics
pub trait WorkerMetricsProvider: Send + Sync {
    /// Partition label (e.g. "p3")
    fn partition(&self) -> String;

    /// Get a snapshot of the current counters
    fn snapshot(&self) -> WorkerMetricsSnapshot;
}

/// Point-in-time snapshot of one sink writer's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkMetricsSnapshot {
    /// Blocks successfully written
    pub blocks_written: u64,
    /// Frames contained in those blocks
    pub frames_written: u64,
    /// Bytes successfully written
    pub bytes_written: u64,
    /// Failed write calls
    pub write_errors: u64,
}

/// Trait for sinks to expose their metrics
pub trait SinkMetricsProvider: Send + Sync {
    /// Instance identifier (e.g. "blob:p3")
    fn sink_id(&self) -> String;

    /// Sink type (e.g. "index", "blob", "null")
    fn sink_type(&self) -> &'static str;

    /// Get a snapshot of the current counters
    fn snapshot(&self) -> SinkMetricsSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshots_are_plain_values() {
        let a = WorkerMetricsSnapshot {
            events_received: 10,
            ..Default::default()
        };
        let b = a;
        assert_eq!(a, b);

        let s = SinkMetricsSnapshot::default();
        assert_eq!(s.blocks_written, 0);
    }
}
