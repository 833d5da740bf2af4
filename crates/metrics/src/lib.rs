//! Silo Metrics - provider traits and the unified reporter
//!
//! Components keep their own lock-free atomic counters; this crate defines
//! the snapshot types and provider traits the reporter uses to collect them
//! without knowing concrete component types, plus the reporter task itself.
//!
//! # Design
//!
//! - Counters live in the components (workers, sinks) as `AtomicU64` fields
//! - Providers hand out point-in-time `*Snapshot` copies
//! - The `UnifiedReporter` runs as one async task, collecting and logging
//!   snapshots at a fixed interval until cancelled

mod reporter;
mod traits;

pub use reporter::{ReporterConfig, UnifiedReporter, UnifiedReporterBuilder};
pub use traits::{
    SinkMetricsProvider, SinkMetricsSnapshot, WorkerMetricsProvider, WorkerMetricsSnapshot,
};
