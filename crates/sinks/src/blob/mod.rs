//! Blob sink - rolling append-only block files
//!
//! Persists blocks to local files organized by partition and time bucket:
//!
//! ```text
//! {base_path}/{partition}/{YYYY-MM-DD}/{HH}/blocks-{seq:05}.bin
//! ```
//!
//! A file receives appended block entries until the next entry would push it
//! past `max_file_bytes`, then the writer rolls to a new sequence number.
//! Every write is flushed and fsynced before `write` returns success; the
//! checkpoint must never run ahead of what is actually on disk.
//!
//! # Entry Format
//!
//! ```text
//! [u32 BE block len][u64 BE watermark][u32 BE frame count][block bytes]
//! ```
//!
//! Duplicate entries (same watermark) are expected under at-least-once
//! delivery; readers key on the watermark and keep the first occurrence.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use silo_protocol::{Block, PartitionId};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::common::{SinkError, SinkMetrics, SinkMetricsHandle};
use crate::{BlockWriter, WriterFactory};

/// Size of the fixed entry header in bytes
const ENTRY_HEADER_SIZE: usize = 4 + 8 + 4;

/// Configuration for the blob writer
#[derive(Debug, Clone)]
pub struct BlobWriterConfig {
    /// Root directory for block files
    pub base_path: PathBuf,

    /// Roll to a new file when the current one would exceed this size
    pub max_file_bytes: u64,
}

impl Default for BlobWriterConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("blocks"),
            max_file_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl BlobWriterConfig {
    /// Set the base path
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Set the roll size
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }
}

struct OpenFile {
    file: File,
    path: PathBuf,
    bytes_written: u64,
}

struct RollState {
    current: Option<OpenFile>,
    bucket: String,
    seq: u32,
}

/// Rolling append-only block writer for one partition
pub struct BlobWriter {
    partition: PartitionId,
    config: BlobWriterConfig,
    metrics: Arc<SinkMetrics>,
    state: Mutex<RollState>,
}

impl BlobWriter {
    /// Create a writer for `partition`
    pub fn new(partition: PartitionId, config: BlobWriterConfig) -> Self {
        Self {
            partition,
            config,
            metrics: Arc::new(SinkMetrics::new()),
            state: Mutex::new(RollState {
                current: None,
                bucket: String::new(),
                seq: 0,
            }),
        }
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(
            format!("blob:{}", self.partition),
            "blob",
            Arc::clone(&self.metrics),
        )
    }

    /// Path of the file currently being appended to, if any (tests)
    pub async fn current_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .await
            .current
            .as_ref()
            .map(|f| f.path.clone())
    }

    async fn roll(&self, state: &mut RollState, bucket: String) -> Result<(), SinkError> {
        let dir = self
            .config
            .base_path
            .join(self.partition.to_string())
            .join(&bucket);
        tokio::fs::create_dir_all(&dir).await?;

        state.seq += 1;
        let path = dir.join(format!("blocks-{:05}.bin", state.seq));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(
            partition = %self.partition,
            path = %path.display(),
            "rolled to new block file"
        );

        state.bucket = bucket;
        state.current = Some(OpenFile {
            file,
            path,
            bytes_written: 0,
        });
        Ok(())
    }
}

impl BlockWriter for BlobWriter {
    async fn write(&self, block: &Block) -> Result<(), SinkError> {
        let entry_len = (ENTRY_HEADER_SIZE + block.len()) as u64;
        let bucket = bucket_for(Utc::now());

        let mut state = self.state.lock().await;

        let needs_roll = match &state.current {
            None => true,
            Some(open) => {
                state.bucket != bucket
                    || open.bytes_written + entry_len > self.config.max_file_bytes
            }
        };
        if needs_roll {
            if let Err(e) = self.roll(&mut state, bucket).await {
                self.metrics.write_error();
                return Err(e);
            }
        }

        let open = state.current.as_mut().expect("rolled above");

        let result: Result<(), std::io::Error> = async {
            let mut header = [0u8; ENTRY_HEADER_SIZE];
            header[0..4].copy_from_slice(&(block.len() as u32).to_be_bytes());
            header[4..12].copy_from_slice(&block.watermark().as_u64().to_be_bytes());
            header[12..16].copy_from_slice(&(block.frame_count() as u32).to_be_bytes());

            open.file.write_all(&header).await?;
            open.file.write_all(block.bytes()).await?;
            open.file.flush().await?;
            // Durability before the checkpoint is allowed to move.
            open.file.sync_data().await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                open.bytes_written += entry_len;
                self.metrics
                    .block_written(block.frame_count() as u64, block.len() as u64);
                tracing::debug!(
                    partition = %self.partition,
                    watermark = %block.watermark(),
                    bytes = block.len(),
                    path = %open.path.display(),
                    "block appended"
                );
                Ok(())
            }
            Err(e) => {
                // The file may now hold a torn entry; drop it and roll on the
                // next attempt so a retry never appends after a partial write.
                state.current = None;
                self.metrics.write_error();
                Err(e.into())
            }
        }
    }
}

/// Time bucket (`YYYY-MM-DD/HH`) for a timestamp
fn bucket_for(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d/%H").to_string()
}

/// Factory producing one `BlobWriter` per partition
#[derive(Debug, Clone)]
pub struct BlobWriterFactory {
    config: BlobWriterConfig,
}

impl BlobWriterFactory {
    /// Create a factory with shared settings
    pub fn new(config: BlobWriterConfig) -> Self {
        Self { config }
    }
}

impl WriterFactory for BlobWriterFactory {
    type Writer = BlobWriter;

    fn create(&self, partition: PartitionId) -> Result<Self::Writer, SinkError> {
        Ok(BlobWriter::new(partition, self.config.clone()))
    }
}

/// One decoded entry from a block file
#[derive(Debug, Clone)]
pub struct BlobEntry {
    /// Watermark recorded with the block
    pub watermark: u64,

    /// Frame count recorded with the block
    pub frame_count: u32,

    /// The block bytes
    pub bytes: Bytes,
}

/// Decode every entry in a block file's contents
///
/// Used by readers and tests; fails on a torn trailing entry.
pub fn read_block_entries(data: &[u8]) -> Result<Vec<BlobEntry>, SinkError> {
    let mut entries = Vec::new();
    let mut at = 0usize;

    while at < data.len() {
        if data.len() - at < ENTRY_HEADER_SIZE {
            return Err(SinkError::InvalidBlock(format!(
                "torn entry header at offset {at}"
            )));
        }
        let len = u32::from_be_bytes(data[at..at + 4].try_into().unwrap()) as usize;
        let watermark = u64::from_be_bytes(data[at + 4..at + 12].try_into().unwrap());
        let frame_count = u32::from_be_bytes(data[at + 12..at + 16].try_into().unwrap());

        let start = at + ENTRY_HEADER_SIZE;
        let end = start + len;
        if end > data.len() {
            return Err(SinkError::InvalidBlock(format!(
                "torn entry body at offset {at}"
            )));
        }

        entries.push(BlobEntry {
            watermark,
            frame_count,
            bytes: Bytes::copy_from_slice(&data[start..end]),
        });
        at = end;
    }

    Ok(entries)
}
