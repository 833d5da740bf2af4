//! Silo Pipeline - the buffered-flush-then-checkpoint engine
//!
//! This crate is the correctness core of silo. Per partition it decides when
//! an accumulating frame buffer is full enough to flush, turns the flush into
//! a sink write with bounded retry, and advances the durable checkpoint only
//! after the write is acknowledged.
//!
//! ```text
//! [Transport] --> [PartitionWorker] --> [FrameBuffer]
//!                       |  (FlushPolicy trigger)
//!                       v
//!                  [BlockWriter]  --retry/backoff--> durable block
//!                       |
//!                       v
//!                [CheckpointTracker] --> durable checkpoint store
//! ```
//!
//! # The contract
//!
//! For every partition: `checkpoint ≤ watermark of the last durably written
//! block`. The checkpoint is never advanced speculatively: not on buffering,
//! not on a write attempt, only on write success. Everything else here
//! (backpressure, retry, drain-on-shutdown, fault isolation) exists to keep
//! that invariant while making progress.
//!
//! # Concurrency
//!
//! One `PartitionWorker` task per owned partition, single-writer over its
//! buffer and checkpoint; workers share nothing but the `Coordinator`'s
//! registry. Cancellation is cooperative via `CancellationToken`, checked at
//! every suspension point.

mod checkpoint;
mod coordinator;
mod error;
mod metrics;
mod policy;
mod retry;
mod worker;

pub use checkpoint::{Advance, CheckpointTracker};
pub use coordinator::{Coordinator, FaultPolicy};
pub use error::{CheckpointError, WorkerFault};
pub use metrics::{WorkerMetrics, WorkerMetricsHandle, WorkerMetricsRegistry};
pub use policy::FlushPolicy;
pub use retry::RetryPolicy;
pub use worker::{WorkerConfig, WorkerOutcome, WorkerReport, WorkerState, PartitionWorker};

/// Default per-partition buffer capacity in bytes
pub const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024 * 1024;

/// Default buffer fill ratio that triggers a flush
pub const DEFAULT_FILL_THRESHOLD: f64 = 0.9;

/// Default maximum time between flushes on a quiet partition
pub const DEFAULT_MAX_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default grace period for the shutdown drain
pub const DEFAULT_DRAIN_GRACE_SECS: u64 = 10;
