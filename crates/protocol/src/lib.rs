//! Silo Protocol - Core types for the partitioned archiver
//!
//! This crate provides the foundational types that flow through the pipeline:
//! - `Event` - One payload pulled from a partition, tagged with its stream position
//! - `Frame` - Deterministic size-prefixed serialization of an Event
//! - `FrameBuffer` - Fixed-capacity accumulator owned by one partition worker
//! - `Block` - Immutable snapshot of a buffer, handed to a sink writer
//!
//! # Design Principles
//!
//! - **Zero-copy**: `Block` wraps `bytes::Bytes` so retried sink writes and
//!   fan-out never copy the payload
//! - **Single-writer**: a `FrameBuffer` is owned by exactly one worker; it has
//!   no internal locking
//! - **Never lie about capacity**: `append` either fits a whole frame or
//!   reports `WouldOverflow` without mutating anything
//!
//! # Wire Format
//!
//! Each frame is `[u64 position][u64 timestamp_ms][u32 len][payload]`, all
//! integers big-endian. A block is the plain concatenation of its frames; any
//! envelope beyond that is sink-specific.

mod block;
mod buffer;
mod error;
mod event;
mod frame;
mod ids;

pub use block::Block;
pub use buffer::{AppendOutcome, FrameBuffer};
pub use error::ProtocolError;
pub use event::Event;
pub use frame::{Frame, FrameIter, FRAME_HEADER_SIZE};
pub use ids::{PartitionId, StreamPosition};

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};
