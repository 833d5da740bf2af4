//! Partition stream traits and ownership notifications

use silo_protocol::{Event, PartitionId, StreamPosition};

use crate::error::TransportError;

/// What a partition source hands back on each receive
#[derive(Debug, Clone)]
pub enum Received {
    /// The next event in partition order
    Event(Event),

    /// The partition has no further events and never will (stream closed)
    EndOfPartition,
}

/// Per-partition event delivery
///
/// `next()` suspends until an event is available, the partition ends, or the
/// transport fails. Implementations deliver events in strictly increasing
/// position order and must be cancel-safe: dropping the future of a pending
/// `next()` must not lose the event it would have returned.
pub trait PartitionSource: Send {
    /// Pull the next event from the partition
    fn next(
        &mut self,
    ) -> impl std::future::Future<Output = Result<Received, TransportError>> + Send;
}

/// Opens partition streams at a resume position
///
/// The coordinator calls `open` once per acquired partition, passing the
/// position stored in the checkpoint store (the stream resumes at the event
/// *after* it). `None` means no checkpoint exists yet and the stream starts
/// at the beginning of the partition.
pub trait StreamFactory: Send + Sync {
    /// The source type produced by this factory
    type Source: PartitionSource + Send + 'static;

    /// Open a stream over `partition`, resuming after `checkpoint`
    fn open(
        &self,
        partition: PartitionId,
        checkpoint: Option<StreamPosition>,
    ) -> impl std::future::Future<Output = Result<Self::Source, TransportError>> + Send;
}

/// Partition ownership notification delivered to the coordinator
///
/// The transport's lease manager decides who owns which partition; the
/// pipeline only reacts. Acquired starts a worker, Revoked drains and stops
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipEvent {
    /// This process now owns the partition
    Acquired(PartitionId),

    /// The lease was revoked; drain and release the partition
    Revoked(PartitionId),
}

impl OwnershipEvent {
    /// The partition this event refers to
    pub fn partition(&self) -> PartitionId {
        match self {
            Self::Acquired(p) | Self::Revoked(p) => *p,
        }
    }
}
