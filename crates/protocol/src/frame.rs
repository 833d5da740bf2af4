//! Frame - deterministic serialization of one Event
//!
//! A frame is the unit that gets batched into blocks. The layout is a fixed
//! 20-byte header followed by the payload:
//!
//! ```text
//! [u64 BE position][u64 BE timestamp_ms][u32 BE payload len][payload bytes]
//! ```
//!
//! A missing producer timestamp is encoded as 0. Encoding the same event
//! always produces identical bytes, so a retried flush re-sends the exact
//! block the sink may have already seen.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::event::Event;
use crate::ids::StreamPosition;

/// Size of the fixed frame header in bytes
pub const FRAME_HEADER_SIZE: usize = 8 + 8 + 4;

/// A serialized event ready for batching
///
/// Holds a reference back to the source event's payload; the actual bytes are
/// only written out when the frame is appended to a buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    position: StreamPosition,
    timestamp_ms: u64,
    payload: Bytes,
}

impl Frame {
    /// Serialize an event into a frame
    pub fn from_event(event: &Event) -> Self {
        Self {
            position: event.position(),
            timestamp_ms: event.timestamp_ms().unwrap_or(0),
            payload: event.payload().clone(),
        }
    }

    /// Stream position of the framed event
    #[inline]
    pub fn position(&self) -> StreamPosition {
        self.position
    }

    /// Producer timestamp in Unix milliseconds (0 when absent)
    #[inline]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Payload bytes
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total encoded size: header + payload
    #[inline]
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Append the encoded frame to `buf`
    ///
    /// The caller is responsible for capacity checks; this always writes the
    /// full frame.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u64(self.position.as_u64());
        buf.put_u64(self.timestamp_ms);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
    }
}

/// Iterator over the frames contained in a block's byte sequence
///
/// Used by sinks that need per-event access (the index writer builds one bulk
/// document per frame). Yields `ProtocolError::TruncatedFrame` if the bytes
/// end mid-frame.
pub struct FrameIter {
    bytes: Bytes,
    offset: usize,
}

impl FrameIter {
    /// Iterate over the frames encoded in `bytes`
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes, offset: 0 }
    }
}

impl Iterator for FrameIter {
    type Item = Result<Frame, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let at = self.offset;
        let remaining = self.bytes.len() - at;
        if remaining < FRAME_HEADER_SIZE {
            self.offset = self.bytes.len();
            return Some(Err(ProtocolError::TruncatedFrame {
                offset: at,
                remaining,
            }));
        }

        let position = u64::from_be_bytes(self.bytes[at..at + 8].try_into().unwrap());
        let timestamp_ms = u64::from_be_bytes(self.bytes[at + 8..at + 16].try_into().unwrap());
        let len = u32::from_be_bytes(self.bytes[at + 16..at + 20].try_into().unwrap()) as usize;

        let start = at + FRAME_HEADER_SIZE;
        let end = start + len;
        if end > self.bytes.len() {
            self.offset = self.bytes.len();
            return Some(Err(ProtocolError::TruncatedFrame {
                offset: at,
                remaining,
            }));
        }

        self.offset = end;
        Some(Ok(Frame {
            position: StreamPosition::new(position),
            timestamp_ms,
            payload: self.bytes.slice(start..end),
        }))
    }
}
