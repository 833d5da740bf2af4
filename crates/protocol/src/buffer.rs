//! FrameBuffer - fixed-capacity frame accumulator
//!
//! One buffer is owned by exactly one partition worker (single-writer
//! discipline), so there is no internal synchronization. The buffer is the
//! pipeline's backpressure valve: when a frame does not fit, `append` refuses
//! without mutating anything and the worker must flush before retrying.

use bytes::BytesMut;

use crate::block::Block;
use crate::frame::Frame;
use crate::ids::{PartitionId, StreamPosition};

/// Result of attempting to append a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The frame was written into the buffer
    Appended,

    /// The frame does not fit in the remaining capacity; the buffer is
    /// unchanged. Flush first, then retry the same frame.
    WouldOverflow,
}

/// Fixed-capacity accumulator of encoded frames for one partition
///
/// Invariants:
/// - fill size never exceeds capacity
/// - positions of contained frames are strictly increasing (callers feed
///   frames in transport delivery order)
#[derive(Debug)]
pub struct FrameBuffer {
    /// Partition this buffer accumulates for
    partition: PartitionId,

    /// Encoded frame bytes
    buf: BytesMut,

    /// Capacity in bytes; `buf.len()` never exceeds this
    capacity: usize,

    /// Number of frames currently buffered
    frame_count: usize,

    /// Position of the last appended frame (the watermark of the next block)
    last_position: Option<StreamPosition>,
}

impl FrameBuffer {
    /// Create an empty buffer with the given byte capacity
    pub fn new(partition: PartitionId, capacity: usize) -> Self {
        Self {
            partition,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            frame_count: 0,
            last_position: None,
        }
    }

    /// Buffer capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current fill size in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Number of buffered frames
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Position of the last appended frame, if any
    #[inline]
    pub fn last_position(&self) -> Option<StreamPosition> {
        self.last_position
    }

    /// Fill level as a ratio in `[0.0, 1.0]`, the flush policy's input
    #[inline]
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        self.buf.len() as f64 / self.capacity as f64
    }

    /// Whether a frame of `encoded_len` bytes could ever fit an empty buffer
    ///
    /// A frame larger than the total capacity can never be appended; the
    /// worker drops such events instead of flushing forever.
    #[inline]
    pub fn can_ever_fit(&self, encoded_len: usize) -> bool {
        encoded_len <= self.capacity
    }

    /// Append a frame if it fits in the remaining capacity
    ///
    /// On `WouldOverflow` the buffer is left exactly as it was; the caller
    /// flushes and then retries the same frame.
    ///
    /// Frames must arrive in strictly increasing position order; feeding an
    /// out-of-order frame is a caller bug (debug-asserted, not checked in
    /// release builds; the worker is the only caller and consumes a single
    /// ordered stream).
    pub fn append(&mut self, frame: &Frame) -> AppendOutcome {
        let needed = frame.encoded_len();
        if self.buf.len() + needed > self.capacity {
            return AppendOutcome::WouldOverflow;
        }

        debug_assert!(
            self.last_position
                .is_none_or(|last| frame.position() > last),
            "frames must be appended in strictly increasing position order"
        );

        frame.encode_into(&mut self.buf);
        self.frame_count += 1;
        self.last_position = Some(frame.position());
        AppendOutcome::Appended
    }

    /// Capture the buffered bytes as an immutable block and clear the buffer
    ///
    /// Returns `None` when the buffer is empty (a flush of nothing is a
    /// no-op). The returned block carries the position of the last contained
    /// frame as its watermark.
    pub fn snapshot_and_reset(&mut self) -> Option<Block> {
        if self.frame_count == 0 {
            return None;
        }

        // split() takes the filled bytes; the remaining BytesMut keeps (or
        // re-grows to) the original capacity for the next block.
        let bytes = self.buf.split().freeze();
        self.buf.reserve(self.capacity);

        let watermark = self
            .last_position
            .expect("non-empty buffer always has a last position");
        let block = Block::new(self.partition, bytes, watermark, self.frame_count);

        self.frame_count = 0;
        self.last_position = None;

        Some(block)
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;
