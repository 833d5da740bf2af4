//! Transport error types

use thiserror::Error;

/// Errors surfaced by partition sources and stream factories
#[derive(Debug, Error)]
pub enum TransportError {
    /// The partition stream is gone for good (hub dropped, lease lost)
    #[error("partition stream closed: {0}")]
    Closed(String),

    /// Transient delivery failure; the worker retries the receive with backoff
    #[error("transient transport failure: {0}")]
    Transient(String),

    /// The requested partition does not exist on this hub
    #[error("unknown partition: {0}")]
    UnknownPartition(String),
}

impl TransportError {
    /// Whether the receive may be retried in place
    ///
    /// The worker's retry decision is a pure function of this kind: transient
    /// errors are absorbed with backoff, everything else faults the partition.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from durable checkpoint storage
#[derive(Debug, Error)]
pub enum CheckpointStoreError {
    /// I/O failure reading or writing the checkpoint record
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record exists but cannot be decoded
    #[error("corrupt checkpoint record for {partition}: {reason}")]
    Corrupt { partition: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Transient("flaky".into()).is_transient());
        assert!(!TransportError::Closed("done".into()).is_transient());
        assert!(!TransportError::UnknownPartition("p9".into()).is_transient());
    }
}
