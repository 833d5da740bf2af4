//! Durable checkpoint storage
//!
//! The checkpoint store records, per partition, the highest stream position
//! known to be safely persisted downstream. The pipeline's tracker enforces
//! monotonicity and write ordering; the store only has to be durable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use silo_protocol::{PartitionId, StreamPosition};

use crate::error::CheckpointStoreError;

/// Durable per-partition checkpoint storage
pub trait CheckpointStore: Send + Sync {
    /// Load the stored position for a partition (`None` if never written)
    fn load(
        &self,
        partition: PartitionId,
    ) -> impl std::future::Future<Output = Result<Option<StreamPosition>, CheckpointStoreError>> + Send;

    /// Durably record `position` for a partition
    fn persist(
        &self,
        partition: PartitionId,
        position: StreamPosition,
    ) -> impl std::future::Future<Output = Result<(), CheckpointStoreError>> + Send;
}

/// In-memory checkpoint store for tests and the demo host
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    positions: Mutex<HashMap<PartitionId, StreamPosition>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a position synchronously (test convenience)
    pub fn get(&self, partition: PartitionId) -> Option<StreamPosition> {
        self.positions
            .lock()
            .expect("checkpoint store lock poisoned")
            .get(&partition)
            .copied()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(
        &self,
        partition: PartitionId,
    ) -> Result<Option<StreamPosition>, CheckpointStoreError> {
        Ok(self.get(partition))
    }

    async fn persist(
        &self,
        partition: PartitionId,
        position: StreamPosition,
    ) -> Result<(), CheckpointStoreError> {
        self.positions
            .lock()
            .expect("checkpoint store lock poisoned")
            .insert(partition, position);
        Ok(())
    }
}

/// On-disk JSON record, one file per partition
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    position: u64,
    updated_ms: u64,
}

/// File-backed checkpoint store
///
/// One small JSON document per partition under the store directory. Writes go
/// to a temp file first and are renamed into place, so a crash mid-write
/// never leaves a torn record behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointStoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn record_path(&self, partition: PartitionId) -> PathBuf {
        self.dir.join(format!("{partition}.json"))
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(
        &self,
        partition: PartitionId,
    ) -> Result<Option<StreamPosition>, CheckpointStoreError> {
        let path = self.record_path(partition);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CheckpointRecord =
            serde_json::from_str(&contents).map_err(|e| CheckpointStoreError::Corrupt {
                partition: partition.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(StreamPosition::new(record.position)))
    }

    async fn persist(
        &self,
        partition: PartitionId,
        position: StreamPosition,
    ) -> Result<(), CheckpointStoreError> {
        let record = CheckpointRecord {
            position: position.as_u64(),
            updated_ms: Self::now_ms(),
        };
        let json = serde_json::to_vec(&record).expect("checkpoint record serializes");

        let path = self.record_path(partition);
        let tmp = self.dir.join(format!("{partition}.json.tmp"));

        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::trace!(
            partition = %partition,
            position = %position,
            path = %path.display(),
            "checkpoint persisted"
        );

        Ok(())
    }
}
