//! Block - immutable flush unit handed to a sink writer

use bytes::Bytes;

use crate::frame::FrameIter;
use crate::ids::{PartitionId, StreamPosition};

/// The materialized byte sequence produced by one buffer flush
///
/// A block is immutable once created: the bytes are reference-counted, so a
/// sink write that has to be retried re-sends exactly the same data. The
/// `watermark` is the stream position of the last frame the block contains;
/// once the block is durably written, the partition checkpoint may advance to
/// (and never past) this position.
#[derive(Debug, Clone)]
pub struct Block {
    partition: PartitionId,
    bytes: Bytes,
    watermark: StreamPosition,
    frame_count: usize,
}

impl Block {
    /// Create a block from frozen buffer contents
    ///
    /// Callers (the frame buffer) guarantee `bytes` is a concatenation of
    /// well-formed frames and `watermark` is the position of the last one.
    pub fn new(
        partition: PartitionId,
        bytes: Bytes,
        watermark: StreamPosition,
        frame_count: usize,
    ) -> Self {
        Self {
            partition,
            bytes,
            watermark,
            frame_count,
        }
    }

    /// Partition this block was accumulated for
    #[inline]
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Raw block bytes
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Stream position of the last frame in the block
    #[inline]
    pub fn watermark(&self) -> StreamPosition {
        self.watermark
    }

    /// Number of frames in the block
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Size of the block in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// A block never contains zero frames, but keep the conventional pair
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate over the frames contained in this block
    #[inline]
    pub fn frames(&self) -> FrameIter {
        FrameIter::new(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_clone_shares_bytes() {
        let block = Block::new(
            PartitionId::new(0),
            Bytes::from(vec![1u8; 32]),
            StreamPosition::new(5),
            2,
        );
        let copy = block.clone();
        assert_eq!(copy.bytes().as_ptr(), block.bytes().as_ptr());
        assert_eq!(copy.watermark(), StreamPosition::new(5));
        assert_eq!(copy.frame_count(), 2);
    }
}
