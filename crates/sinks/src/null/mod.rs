//! Null sink - discards all blocks
//!
//! Useful for benchmarking the buffering/checkpoint path without a real
//! destination: every write succeeds instantly and counts what it dropped.

use std::sync::Arc;

use silo_protocol::{Block, PartitionId};

use crate::common::{SinkError, SinkMetrics, SinkMetricsHandle};
use crate::{BlockWriter, WriterFactory};

/// Writer that discards every block
pub struct NullWriter {
    partition: PartitionId,
    metrics: Arc<SinkMetrics>,
}

impl NullWriter {
    /// Create a null writer for `partition`
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(
            format!("null:{}", self.partition),
            "null",
            Arc::clone(&self.metrics),
        )
    }
}

impl BlockWriter for NullWriter {
    async fn write(&self, block: &Block) -> Result<(), SinkError> {
        self.metrics
            .block_written(block.frame_count() as u64, block.len() as u64);
        tracing::trace!(
            partition = %block.partition(),
            watermark = %block.watermark(),
            bytes = block.len(),
            "block discarded"
        );
        Ok(())
    }
}

/// Factory producing one `NullWriter` per partition
#[derive(Debug, Default, Clone)]
pub struct NullWriterFactory;

impl WriterFactory for NullWriterFactory {
    type Writer = NullWriter;

    fn create(&self, partition: PartitionId) -> Result<Self::Writer, SinkError> {
        Ok(NullWriter::new(partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use silo_metrics::SinkMetricsProvider;
    use silo_protocol::StreamPosition;

    #[tokio::test]
    async fn test_null_writer_counts() {
        let writer = NullWriterFactory.create(PartitionId::new(2)).unwrap();
        let handle = writer.metrics_handle();

        let block = Block::new(
            PartitionId::new(2),
            Bytes::from(vec![0u8; 128]),
            StreamPosition::new(4),
            3,
        );

        writer.write(&block).await.unwrap();
        writer.write(&block).await.unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.blocks_written, 2);
        assert_eq!(snapshot.frames_written, 6);
        assert_eq!(snapshot.bytes_written, 256);
    }
}
