//! Silo Sinks - durable destinations for flushed blocks
//!
//! Each sink implements `BlockWriter`: persist one immutable block, report
//! success or a classified failure. The partition worker owns retry; a writer
//! only has to make one honest attempt and classify what went wrong.
//!
//! ```text
//! [Worker] --Block--> [BlockWriter::write] --> index | blob | null
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Destination | Idempotency |
//! |------|-------------|-------------|
//! | `index` | HTTP bulk-index endpoint (`POST .../_bulk`) | deterministic doc ids (`{partition}-{position}`) |
//! | `blob` | Rolling append-only local files | duplicate blocks tolerated by readers (watermark-keyed) |
//! | `null` | Discard (benchmarks, tests) | trivially |
//!
//! A writer must be safe to call more than once with the same block: the
//! pipeline guarantees at-least-once delivery, not exactly-once.

pub mod blob;
pub mod index;
pub mod null;

mod common;

use silo_protocol::{Block, PartitionId};

pub use blob::{read_block_entries, BlobEntry, BlobWriter, BlobWriterConfig, BlobWriterFactory};
pub use common::{SinkError, SinkMetrics, SinkMetricsHandle};
pub use index::{IndexWriter, IndexWriterConfig, IndexWriterFactory};
pub use null::{NullWriter, NullWriterFactory};

/// Durably persist one block
///
/// `write` returns only after the block is durable at the destination (or the
/// attempt failed). Implementations classify failures via `SinkError` so the
/// worker's retry decision is a pure function of the error kind.
pub trait BlockWriter: Send + Sync {
    /// Write one block
    fn write(
        &self,
        block: &Block,
    ) -> impl std::future::Future<Output = Result<(), SinkError>> + Send;
}

/// Creates one writer per acquired partition
///
/// The coordinator calls this when it starts a worker, mirroring how each
/// partition gets its own buffer: writers never share mutable state across
/// partitions.
pub trait WriterFactory: Send + Sync {
    /// The writer type produced by this factory
    type Writer: BlockWriter + Send + 'static;

    /// Create a writer for `partition`
    fn create(&self, partition: PartitionId) -> Result<Self::Writer, SinkError>;
}
