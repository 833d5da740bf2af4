//! Checkpoint tracker - monotonic, duplicate-tolerant advance
//!
//! The tracker is the only component that writes checkpoints. It is created
//! per partition when the worker starts (loading the resume position) and fed
//! exactly one `advance` per durably written block, with that block's
//! watermark, never before the sink write returned success.

use std::sync::Arc;

use silo_protocol::{PartitionId, StreamPosition};
use silo_transport::CheckpointStore;

use crate::error::CheckpointError;

/// Outcome of an advance call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The position was persisted and the cache moved forward
    Advanced,

    /// The position is at or behind the recorded checkpoint; nothing written.
    /// Expected after a retried write re-delivers an already-covered block.
    AlreadyCovered,
}

/// Per-partition checkpoint bookkeeping over a shared durable store
#[derive(Debug)]
pub struct CheckpointTracker<S> {
    partition: PartitionId,
    store: Arc<S>,
    position: Option<StreamPosition>,
}

impl<S: CheckpointStore> CheckpointTracker<S> {
    /// Create a tracker, loading the partition's stored position
    pub async fn resume(partition: PartitionId, store: Arc<S>) -> Result<Self, CheckpointError> {
        let position = store.load(partition).await?;
        tracing::debug!(
            partition = %partition,
            resume_from = position.map(|p| p.as_u64()),
            "checkpoint tracker resumed"
        );
        Ok(Self {
            partition,
            store,
            position,
        })
    }

    /// The highest position known durably persisted downstream
    #[inline]
    pub fn position(&self) -> Option<StreamPosition> {
        self.position
    }

    /// Record that everything up to `position` is durable downstream
    ///
    /// Monotonic: a position at or behind the current checkpoint is a no-op
    /// (`AlreadyCovered`), not an error. The store persist completes before
    /// the in-memory cache moves, so the cache never runs ahead of disk.
    pub async fn advance(
        &mut self,
        position: StreamPosition,
    ) -> Result<Advance, CheckpointError> {
        if self.position.is_some_and(|current| position <= current) {
            tracing::debug!(
                partition = %self.partition,
                position = %position,
                current = ?self.position,
                "checkpoint advance skipped (already covered)"
            );
            return Ok(Advance::AlreadyCovered);
        }

        self.store.persist(self.partition, position).await?;
        self.position = Some(position);

        tracing::debug!(
            partition = %self.partition,
            position = %position,
            "checkpoint advanced"
        );
        Ok(Advance::Advanced)
    }
}

#[cfg(test)]
mod tests {
    use silo_transport::MemoryCheckpointStore;

    use super::*;

    #[tokio::test]
    async fn test_fresh_partition_has_no_position() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let tracker = CheckpointTracker::resume(PartitionId::new(0), store)
            .await
            .unwrap();
        assert_eq!(tracker.position(), None);
    }

    #[tokio::test]
    async fn test_advance_persists_and_caches() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut tracker = CheckpointTracker::resume(PartitionId::new(1), Arc::clone(&store))
            .await
            .unwrap();

        assert_eq!(
            tracker.advance(StreamPosition::new(10)).await.unwrap(),
            Advance::Advanced
        );
        assert_eq!(tracker.position(), Some(StreamPosition::new(10)));
        assert_eq!(store.get(PartitionId::new(1)), Some(StreamPosition::new(10)));
    }

    #[tokio::test]
    async fn test_duplicate_advance_is_noop() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut tracker = CheckpointTracker::resume(PartitionId::new(0), Arc::clone(&store))
            .await
            .unwrap();

        tracker.advance(StreamPosition::new(5)).await.unwrap();
        assert_eq!(
            tracker.advance(StreamPosition::new(5)).await.unwrap(),
            Advance::AlreadyCovered
        );
        assert_eq!(
            tracker.advance(StreamPosition::new(3)).await.unwrap(),
            Advance::AlreadyCovered
        );

        // The durable record was written exactly once, at 5.
        assert_eq!(store.get(PartitionId::new(0)), Some(StreamPosition::new(5)));
    }

    #[tokio::test]
    async fn test_resume_picks_up_stored_position() {
        let store = Arc::new(MemoryCheckpointStore::new());
        {
            let mut tracker = CheckpointTracker::resume(PartitionId::new(2), Arc::clone(&store))
                .await
                .unwrap();
            tracker.advance(StreamPosition::new(42)).await.unwrap();
        }

        let tracker = CheckpointTracker::resume(PartitionId::new(2), store)
            .await
            .unwrap();
        assert_eq!(tracker.position(), Some(StreamPosition::new(42)));
    }
}
