//! Silo Transport - the boundary to the partitioned event stream
//!
//! The pipeline core never talks to a broker SDK directly; it consumes the
//! traits defined here:
//!
//! - `PartitionSource` - per-partition event delivery (`next()` suspends until
//!   data arrives or the partition ends)
//! - `StreamFactory` - opens a partition's stream at a resume position
//! - `CheckpointStore` - durable per-partition checkpoint storage
//! - `OwnershipEvent` - acquire/release notifications feeding the coordinator
//!
//! # Implementations
//!
//! `MemoryHub` is a complete in-process transport used by the integration
//! tests and the `silod` demo host: per-partition ordered logs with positions
//! assigned on publish, replayable from any checkpoint. `MemoryCheckpointStore`
//! and `FileCheckpointStore` cover the checkpoint side; the file store writes
//! one small JSON document per partition with a temp-file-then-rename so a
//! crash never leaves a torn checkpoint.
//!
//! The `simulator` module generates synthetic device traffic into a hub.

mod checkpoint;
mod error;
mod hub;
pub mod simulator;
mod stream;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use error::{CheckpointStoreError, TransportError};
pub use hub::{MemoryHub, MemoryPartitionSource};
pub use stream::{OwnershipEvent, PartitionSource, Received, StreamFactory};
