//! Protocol error types

use thiserror::Error;

/// Errors produced while decoding frames from block bytes
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Block bytes ended in the middle of a frame
    #[error("truncated frame at offset {offset} ({remaining} bytes remaining)")]
    TruncatedFrame { offset: usize, remaining: usize },

    /// Payload is not valid UTF-8 where a sink required text
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::TruncatedFrame {
            offset: 10,
            remaining: 3,
        };
        assert!(err.to_string().contains("offset 10"));
    }
}
