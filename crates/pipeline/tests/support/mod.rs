//! Shared helpers for pipeline integration tests
//!
//! Shared across test targets; not every helper is used by every target.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use silo_pipeline::{FlushPolicy, RetryPolicy, WorkerConfig};
use silo_protocol::{Block, PartitionId, StreamPosition};
use silo_sinks::{BlockWriter, SinkError, WriterFactory};
use silo_transport::{CheckpointStore, CheckpointStoreError, MemoryCheckpointStore, MemoryHub};

/// One scripted response from the fake sink
#[derive(Debug, Clone, Copy)]
pub enum WriteStep {
    Ok,
    Retryable,
    Fatal,
    /// Never completes; used to exercise drain/write timeouts
    Hang,
}

/// What the fake sink observed for one write call
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub watermark: u64,
    pub frames: usize,
    pub ok: bool,
}

/// Sink writer driven by a script of responses
///
/// Once the script runs out, every further write succeeds. All clones share
/// the same script and log.
#[derive(Clone)]
pub struct ScriptedWriter {
    script: Arc<Mutex<VecDeque<WriteStep>>>,
    log: Arc<Mutex<Vec<WriteRecord>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedWriter {
    pub fn new(steps: impl IntoIterator<Item = WriteStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            log: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn always_ok() -> Self {
        Self::new([])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Watermarks of successful writes, in observation order
    pub fn written_watermarks(&self) -> Vec<u64> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.ok)
            .map(|r| r.watermark)
            .collect()
    }

    pub fn records(&self) -> Vec<WriteRecord> {
        self.log.lock().unwrap().clone()
    }
}

impl BlockWriter for ScriptedWriter {
    async fn write(&self, block: &Block) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(WriteStep::Ok);

        let ok = matches!(step, WriteStep::Ok);
        if !matches!(step, WriteStep::Hang) {
            self.log.lock().unwrap().push(WriteRecord {
                watermark: block.watermark().as_u64(),
                frames: block.frame_count(),
                ok,
            });
        }

        match step {
            WriteStep::Ok => Ok(()),
            WriteStep::Retryable => Err(SinkError::Timeout),
            WriteStep::Fatal => Err(SinkError::Rejected("scripted fatal".into())),
            WriteStep::Hang => std::future::pending().await,
        }
    }
}

/// Factory handing out clones of pre-built writers, one per create call
pub struct ScriptedFactory {
    writers: Mutex<VecDeque<ScriptedWriter>>,
    fallback: ScriptedWriter,
    created: AtomicU32,
}

impl ScriptedFactory {
    /// `writers` are handed out in order; once exhausted, clones of
    /// `fallback` are used
    pub fn new(writers: impl IntoIterator<Item = ScriptedWriter>, fallback: ScriptedWriter) -> Self {
        Self {
            writers: Mutex::new(writers.into_iter().collect()),
            fallback,
            created: AtomicU32::new(0),
        }
    }

    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

impl WriterFactory for ScriptedFactory {
    type Writer = ScriptedWriter;

    fn create(&self, _partition: PartitionId) -> Result<Self::Writer, SinkError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let next = self.writers.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Checkpoint store that records every persist in order
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryCheckpointStore,
    history: Mutex<Vec<(u32, u64)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, partition: PartitionId) -> Option<StreamPosition> {
        self.inner.get(partition)
    }

    /// `(partition, position)` pairs in persist order
    pub fn history(&self) -> Vec<(u32, u64)> {
        self.history.lock().unwrap().clone()
    }
}

impl CheckpointStore for RecordingStore {
    async fn load(
        &self,
        partition: PartitionId,
    ) -> Result<Option<StreamPosition>, CheckpointStoreError> {
        self.inner.load(partition).await
    }

    async fn persist(
        &self,
        partition: PartitionId,
        position: StreamPosition,
    ) -> Result<(), CheckpointStoreError> {
        self.inner.persist(partition, position).await?;
        self.history
            .lock()
            .unwrap()
            .push((partition.as_u32(), position.as_u64()));
        Ok(())
    }
}

/// Worker config tuned for fast tests
pub fn fast_config(buffer_capacity: usize) -> WorkerConfig {
    WorkerConfig {
        buffer_capacity,
        flush: FlushPolicy::new(0.9, Duration::from_secs(3600)),
        receive_idle: Duration::from_millis(20),
        write_retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        write_timeout: Duration::from_secs(2),
        checkpoint_retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        checkpoint_timeout: Duration::from_secs(1),
        drain_grace: Duration::from_secs(1),
    }
}

/// Publish `count` events of `payload_len` bytes each to one partition
pub fn publish_events(hub: &MemoryHub, partition: PartitionId, count: usize, payload_len: usize) {
    for i in 0..count {
        hub.publish(
            partition,
            Some(1_700_000_000_000 + i as u64),
            Bytes::from(vec![b'x'; payload_len]),
        )
        .expect("publish");
    }
}
