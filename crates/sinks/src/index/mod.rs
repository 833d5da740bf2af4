//! Index sink - HTTP bulk writes to a search-index endpoint
//!
//! Writes each block as one ND-JSON bulk request
//! (`POST {base_url}/{prefix}-{partition}/_bulk`), one document per frame.
//! Document ids are deterministic (`{partition}-{position}`) so a retried or
//! replayed block overwrites the same documents instead of duplicating them;
//! the dedup half of the at-least-once contract lives here.
//!
//! Frame payloads that parse as JSON are indexed as-is under `doc`; anything
//! else is wrapped as `{"raw": "<lossy text>"}` rather than rejected, the
//! archiver does not get to drop data because a producer was sloppy.

use std::sync::Arc;
use std::time::Duration;

use silo_protocol::{Block, PartitionId};

use crate::common::{SinkError, SinkMetrics, SinkMetricsHandle};
use crate::{BlockWriter, WriterFactory};

/// Configuration for the index writer
#[derive(Debug, Clone)]
pub struct IndexWriterConfig {
    /// Endpoint base URL (e.g. `http://localhost:9200`)
    pub base_url: String,

    /// Index name prefix; the partition id is appended per writer
    pub index_prefix: String,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for IndexWriterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".into(),
            index_prefix: "events".into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Minimal slice of the bulk response we care about
#[derive(Debug, serde::Deserialize)]
struct BulkResponse {
    errors: bool,
}

/// Bulk-index writer for one partition
pub struct IndexWriter {
    partition: PartitionId,
    index: String,
    bulk_url: String,
    client: reqwest::Client,
    metrics: Arc<SinkMetrics>,
}

impl IndexWriter {
    /// Create a writer for `partition` sharing `client`
    pub fn new(
        partition: PartitionId,
        config: &IndexWriterConfig,
        client: reqwest::Client,
    ) -> Self {
        let index = format!("{}-{}", config.index_prefix, partition);
        let bulk_url = format!("{}/{}/_bulk", config.base_url.trim_end_matches('/'), index);
        Self {
            partition,
            index,
            bulk_url,
            client,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Target index name
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(
            format!("index:{}", self.partition),
            "index",
            Arc::clone(&self.metrics),
        )
    }
}

impl BlockWriter for IndexWriter {
    async fn write(&self, block: &Block) -> Result<(), SinkError> {
        let body = build_bulk_body(self.partition, block)?;

        let response = self
            .client
            .post(&self.bulk_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                self.metrics.write_error();
                classify_request_error(&e)
            })?;

        let status = response.status().as_u16();
        if let Some(err) = classify_status(status, &self.index) {
            self.metrics.write_error();
            return Err(err);
        }

        // A 200 bulk response can still carry per-item failures; those are
        // content problems a retry of the same bytes cannot fix.
        match response.json::<BulkResponse>().await {
            Ok(bulk) if bulk.errors => {
                self.metrics.write_error();
                return Err(SinkError::Rejected(format!(
                    "bulk response reported item failures for index {}",
                    self.index
                )));
            }
            Ok(_) => {}
            Err(e) => {
                // Accepted status with an unreadable body; the write landed.
                tracing::debug!(index = %self.index, error = %e, "unparseable bulk response");
            }
        }

        self.metrics
            .block_written(block.frame_count() as u64, block.len() as u64);
        tracing::debug!(
            partition = %self.partition,
            index = %self.index,
            watermark = %block.watermark(),
            frames = block.frame_count(),
            "block indexed"
        );
        Ok(())
    }
}

/// Build the ND-JSON bulk body for a block
///
/// One `{"index":{"_id":...}}` action plus one document line per frame.
fn build_bulk_body(partition: PartitionId, block: &Block) -> Result<String, SinkError> {
    let mut body = String::with_capacity(block.len() + block.frame_count() * 64);

    for frame in block.frames() {
        let frame = frame.map_err(|e| SinkError::InvalidBlock(e.to_string()))?;

        let doc_body = match serde_json::from_slice::<serde_json::Value>(frame.payload()) {
            Ok(value) => value,
            Err(_) => serde_json::json!({
                "raw": String::from_utf8_lossy(frame.payload()),
            }),
        };

        let action = serde_json::json!({
            "index": { "_id": format!("{}-{}", partition, frame.position()) }
        });
        let doc = serde_json::json!({
            "partition": partition.to_string(),
            "position": frame.position().as_u64(),
            "timestamp_ms": frame.timestamp_ms(),
            "doc": doc_body,
        });

        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&doc.to_string());
        body.push('\n');
    }

    Ok(body)
}

/// Map a reqwest transport error to a sink error kind
fn classify_request_error(error: &reqwest::Error) -> SinkError {
    if error.is_timeout() {
        SinkError::Timeout
    } else {
        SinkError::Connection(error.to_string())
    }
}

/// Map a non-success HTTP status to a sink error kind
///
/// Returns `None` for success statuses.
fn classify_status(status: u16, index: &str) -> Option<SinkError> {
    match status {
        200..=299 => None,
        404 => Some(SinkError::NotFound(index.to_string())),
        401 | 403 => Some(SinkError::Auth(format!("status {status}"))),
        408 => Some(SinkError::Timeout),
        429 => Some(SinkError::Throttled),
        other => Some(SinkError::HttpStatus { status: other }),
    }
}

/// Factory producing one `IndexWriter` per partition over a shared client
#[derive(Clone)]
pub struct IndexWriterFactory {
    config: IndexWriterConfig,
    client: reqwest::Client,
}

impl IndexWriterFactory {
    /// Create a factory, building the shared HTTP client
    pub fn new(config: IndexWriterConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }
}

impl WriterFactory for IndexWriterFactory {
    type Writer = IndexWriter;

    fn create(&self, partition: PartitionId) -> Result<Self::Writer, SinkError> {
        Ok(IndexWriter::new(partition, &self.config, self.client.clone()))
    }
}
