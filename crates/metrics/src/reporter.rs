//! Unified metrics reporter
//!
//! Collects snapshots from all registered providers and logs a summary line
//! per component at the configured interval. Runs as one async task until
//! cancelled; emits a final report on shutdown so short runs still produce
//! numbers.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::traits::{SinkMetricsProvider, WorkerMetricsProvider};

/// Reporter settings
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Whether periodic reporting is enabled
    pub enabled: bool,

    /// Interval between reports
    pub interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
        }
    }
}

/// Builder for the unified reporter
#[derive(Default)]
pub struct UnifiedReporterBuilder {
    config: Option<ReporterConfig>,
    workers: Vec<Arc<dyn WorkerMetricsProvider>>,
    sinks: Vec<Arc<dyn SinkMetricsProvider>>,
}

impl UnifiedReporterBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reporter configuration
    pub fn config(mut self, config: ReporterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a worker metrics provider
    pub fn worker(mut self, provider: Arc<dyn WorkerMetricsProvider>) -> Self {
        self.workers.push(provider);
        self
    }

    /// Register a sink metrics provider
    pub fn sink(mut self, provider: Arc<dyn SinkMetricsProvider>) -> Self {
        self.sinks.push(provider);
        self
    }

    /// Build the reporter
    pub fn build(self) -> UnifiedReporter {
        UnifiedReporter {
            config: self.config.unwrap_or_default(),
            workers: self.workers,
            sinks: self.sinks,
        }
    }
}

/// Periodic reporter over all registered providers
pub struct UnifiedReporter {
    config: ReporterConfig,
    workers: Vec<Arc<dyn WorkerMetricsProvider>>,
    sinks: Vec<Arc<dyn SinkMetricsProvider>>,
}

impl UnifiedReporter {
    /// Create a new builder
    pub fn builder() -> UnifiedReporterBuilder {
        UnifiedReporterBuilder::new()
    }

    /// Run the reporter until cancellation
    ///
    /// Spawn this as a tokio task alongside the pipeline.
    pub async fn run(self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the first report
        // carries a full interval of activity.
        ticker.tick().await;

        info!(
            interval_secs = self.config.interval.as_secs(),
            workers = self.workers.len(),
            sinks = self.sinks.len(),
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.report();
                    info!("metrics reporter stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Emit one report line per registered provider
    fn report(&self) {
        for worker in &self.workers {
            let s = worker.snapshot();
            info!(
                partition = %worker.partition(),
                events_received = s.events_received,
                frames_appended = s.frames_appended,
                frames_oversized = s.frames_oversized,
                blocks_flushed = s.blocks_flushed,
                bytes_flushed = s.bytes_flushed,
                flush_retries = s.flush_retries,
                blocks_failed = s.blocks_failed,
                checkpoints_advanced = s.checkpoints_advanced,
                checkpoint_failures = s.checkpoint_failures,
                "worker metrics"
            );
        }

        for sink in &self.sinks {
            let s = sink.snapshot();
            info!(
                sink = %sink.sink_id(),
                sink_type = sink.sink_type(),
                blocks_written = s.blocks_written,
                frames_written = s.frames_written,
                bytes_written = s.bytes_written,
                write_errors = s.write_errors,
                "sink metrics"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{SinkMetricsSnapshot, WorkerMetricsSnapshot};

    struct FakeWorker;

    impl WorkerMetricsProvider for FakeWorker {
        fn partition(&self) -> String {
            "p0".into()
        }

        fn snapshot(&self) -> WorkerMetricsSnapshot {
            WorkerMetricsSnapshot {
                events_received: 3,
                ..Default::default()
            }
        }
    }

    struct FakeSink;

    impl SinkMetricsProvider for FakeSink {
        fn sink_id(&self) -> String {
            "null:p0".into()
        }

        fn sink_type(&self) -> &'static str {
            "null"
        }

        fn snapshot(&self) -> SinkMetricsSnapshot {
            SinkMetricsSnapshot::default()
        }
    }

    #[tokio::test]
    async fn test_reporter_stops_on_cancel() {
        let reporter = UnifiedReporter::builder()
            .config(ReporterConfig {
                enabled: true,
                interval: Duration::from_secs(3600),
            })
            .worker(Arc::new(FakeWorker))
            .sink(Arc::new(FakeSink))
            .build();

        let cancel = CancellationToken::new();
        cancel.cancel();

        // Returns promptly (emitting the final report) instead of waiting for
        // the next tick.
        tokio::time::timeout(Duration::from_secs(1), reporter.run(cancel))
            .await
            .expect("reporter exits on cancel");
    }

    #[tokio::test]
    async fn test_disabled_reporter_returns_immediately() {
        let reporter = UnifiedReporter::builder()
            .config(ReporterConfig {
                enabled: false,
                interval: Duration::from_millis(1),
            })
            .build();

        reporter.run(CancellationToken::new()).await;
    }
}
