//! Event - one payload pulled from a partition

use bytes::Bytes;

use crate::ids::StreamPosition;

/// An opaque payload received from the transport, immutable once created
///
/// The payload bytes are reference-counted (`bytes::Bytes`) so an event can be
/// held across a flush boundary without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Position of this event within its partition (strictly increasing)
    position: StreamPosition,

    /// Producer-side timestamp in Unix milliseconds, if the transport carries one
    timestamp_ms: Option<u64>,

    /// Opaque payload bytes
    payload: Bytes,
}

impl Event {
    /// Create a new event
    pub fn new(position: StreamPosition, timestamp_ms: Option<u64>, payload: Bytes) -> Self {
        Self {
            position,
            timestamp_ms,
            payload,
        }
    }

    /// Get the stream position
    #[inline]
    pub fn position(&self) -> StreamPosition {
        self.position
    }

    /// Get the producer timestamp, if present
    #[inline]
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.timestamp_ms
    }

    /// Get the payload bytes
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let ev = Event::new(StreamPosition::new(9), Some(1234), Bytes::from_static(b"abc"));
        assert_eq!(ev.position(), StreamPosition::new(9));
        assert_eq!(ev.timestamp_ms(), Some(1234));
        assert_eq!(ev.payload_len(), 3);
    }

    #[test]
    fn test_event_clone_is_cheap() {
        let ev = Event::new(StreamPosition::new(1), None, Bytes::from(vec![0u8; 64]));
        let copy = ev.clone();
        // Bytes clones share the same backing allocation
        assert_eq!(copy.payload().as_ptr(), ev.payload().as_ptr());
    }
}
