//! Tests for shared sink types

use super::*;

#[test]
fn test_retryable_classification() {
    assert!(SinkError::Timeout.is_retryable());
    assert!(SinkError::Throttled.is_retryable());
    assert!(SinkError::Connection("refused".into()).is_retryable());
    assert!(SinkError::Io(std::io::Error::other("disk")).is_retryable());
    assert!(SinkError::HttpStatus { status: 503 }.is_retryable());

    assert!(!SinkError::HttpStatus { status: 400 }.is_retryable());
    assert!(!SinkError::Rejected("mapping".into()).is_retryable());
    assert!(!SinkError::NotFound("index".into()).is_retryable());
    assert!(!SinkError::Auth("expired key".into()).is_retryable());
    assert!(!SinkError::InvalidBlock("truncated".into()).is_retryable());
}

#[test]
fn test_metrics_accumulate() {
    let metrics = SinkMetrics::new();

    metrics.block_written(10, 4096);
    metrics.block_written(5, 2048);
    metrics.write_error();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.blocks_written, 2);
    assert_eq!(snapshot.frames_written, 15);
    assert_eq!(snapshot.bytes_written, 6144);
    assert_eq!(snapshot.write_errors, 1);
}

#[test]
fn test_handle_reports_shared_counters() {
    use silo_metrics::SinkMetricsProvider;

    let metrics = Arc::new(SinkMetrics::new());
    let handle = SinkMetricsHandle::new("blob:p0", "blob", Arc::clone(&metrics));

    metrics.block_written(1, 100);

    assert_eq!(handle.sink_id(), "blob:p0");
    assert_eq!(handle.sink_type(), "blob");
    assert_eq!(handle.snapshot().blocks_written, 1);
}
