//! Pipeline error types
//!
//! Faults are explicit values, not exceptions: the worker's handling of a
//! failure is a pure function of the error kind it receives from the sink,
//! the transport, or the checkpoint store.

use silo_sinks::SinkError;
use silo_transport::{CheckpointStoreError, TransportError};
use thiserror::Error;

/// Failure to advance the durable checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The store rejected or failed the persist
    #[error("checkpoint store failure: {0}")]
    Store(#[from] CheckpointStoreError),

    /// The persist attempt timed out
    #[error("checkpoint persist timed out")]
    Timeout,
}

impl CheckpointError {
    /// Whether the persist may be retried
    ///
    /// Corrupt records cannot be fixed by retrying; everything else is
    /// assumed transient (the block is already durable, only bookkeeping is
    /// behind).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Store(CheckpointStoreError::Corrupt { .. }))
    }
}

/// Why a partition worker gave up
///
/// Carried in the worker's final report to the coordinator together with the
/// last durable checkpoint, so the operator always sees how far the partition
/// safely got.
#[derive(Debug, Error)]
pub enum WorkerFault {
    /// The sink write failed permanently (fatal error or retries exhausted)
    #[error("sink write failed after {attempts} attempt(s): {source}")]
    SinkWrite {
        #[source]
        source: SinkError,
        attempts: u32,
    },

    /// Checkpoint persistence failed permanently; the block is durable but
    /// the bookkeeping is not, so reprocessing on restart is the safe outcome
    #[error("checkpoint persist failed after {attempts} attempt(s): {source}")]
    Checkpoint {
        #[source]
        source: CheckpointError,
        attempts: u32,
    },

    /// The transport failed non-transiently
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The shutdown drain did not finish within the grace period
    #[error("shutdown drain exceeded the grace period")]
    DrainTimedOut,

    /// The worker could not be constructed (stream open, writer create)
    #[error("worker startup failed: {0}")]
    Startup(String),
}
