//! Pipeline coordinator - one worker per owned partition
//!
//! Reacts to the transport's ownership notifications: acquiring a partition
//! spawns a worker (resumed from the durable checkpoint), losing one drains
//! and stops it. Worker faults come back as reports and are handled per the
//! configured fault policy: restart from the last durable checkpoint with a
//! bounded budget, or release the partition.
//!
//! The worker registry here is the only mutable state shared across
//! partitions, and only this task touches it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use silo_protocol::PartitionId;
use silo_sinks::WriterFactory;
use silo_transport::{CheckpointStore, OwnershipEvent, StreamFactory};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointTracker;
use crate::error::WorkerFault;
use crate::metrics::WorkerMetricsRegistry;
use crate::worker::{PartitionWorker, WorkerConfig, WorkerOutcome, WorkerReport};

/// Extra time the shutdown waits for final reports beyond the drain grace
const SHUTDOWN_REPORT_MARGIN: Duration = Duration::from_secs(5);

/// What to do when a worker faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Restart the worker from its last durable checkpoint, at most
    /// `max_restarts` times per partition; release after the budget is spent
    Restart { max_restarts: u32 },

    /// Relinquish the partition immediately
    Release,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self::Restart { max_restarts: 3 }
    }
}

struct WorkerHandle {
    cancel: CancellationToken,
}

/// Supervises the set of partition workers for currently owned partitions
pub struct Coordinator<F, WF, S> {
    streams: Arc<F>,
    writers: Arc<WF>,
    store: Arc<S>,
    registry: Arc<WorkerMetricsRegistry>,
    config: WorkerConfig,
    fault_policy: FaultPolicy,
    workers: HashMap<PartitionId, WorkerHandle>,
    restarts: HashMap<PartitionId, u32>,
    reports_tx: mpsc::Sender<WorkerReport>,
    reports_rx: Option<mpsc::Receiver<WorkerReport>>,
}

impl<F, WF, S> Coordinator<F, WF, S>
where
    F: StreamFactory + 'static,
    WF: WriterFactory + 'static,
    S: CheckpointStore + 'static,
{
    /// Create a coordinator over the given collaborators
    ///
    /// Collaborators arrive as `Arc`s so the host can keep its own handles
    /// (e.g. to inspect the checkpoint store after shutdown).
    pub fn new(
        streams: Arc<F>,
        writers: Arc<WF>,
        store: Arc<S>,
        config: WorkerConfig,
        fault_policy: FaultPolicy,
    ) -> Self {
        let (reports_tx, reports_rx) = mpsc::channel(64);
        Self {
            streams,
            writers,
            store,
            registry: Arc::new(WorkerMetricsRegistry::new()),
            config,
            fault_policy,
            workers: HashMap::new(),
            restarts: HashMap::new(),
            reports_tx,
            reports_rx: Some(reports_rx),
        }
    }

    /// Shared per-partition metrics registry (register reporter providers
    /// from here; counters survive worker restarts)
    pub fn metrics_registry(&self) -> Arc<WorkerMetricsRegistry> {
        Arc::clone(&self.registry)
    }

    /// Number of currently running workers
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run until cancellation or the ownership stream closes
    pub async fn run(
        mut self,
        mut ownership_rx: mpsc::Receiver<OwnershipEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(fault_policy = ?self.fault_policy, "coordinator started");

        let mut reports_rx = self
            .reports_rx
            .take()
            .expect("coordinator can only run once");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = ownership_rx.recv() => match event {
                    Some(OwnershipEvent::Acquired(partition)) => self.start_worker(partition),
                    Some(OwnershipEvent::Revoked(partition)) => self.stop_worker(partition),
                    None => {
                        tracing::info!("ownership stream ended");
                        break;
                    }
                },
                Some(report) = reports_rx.recv() => self.handle_report(report),
            }
        }

        self.shutdown(&mut reports_rx).await;
    }

    /// Spawn a worker for a newly acquired partition
    fn start_worker(&mut self, partition: PartitionId) {
        if self.workers.contains_key(&partition) {
            tracing::warn!(partition = %partition, "partition already has a worker, ignoring acquire");
            return;
        }

        tracing::info!(partition = %partition, "partition acquired, starting worker");
        self.spawn(partition);
    }

    fn spawn(&mut self, partition: PartitionId) {
        let worker_cancel = CancellationToken::new();
        let handle = WorkerHandle {
            cancel: worker_cancel.clone(),
        };

        let streams = Arc::clone(&self.streams);
        let writers = Arc::clone(&self.writers);
        let store = Arc::clone(&self.store);
        let metrics = self.registry.metrics_for(partition);
        let config = self.config.clone();
        let reports_tx = self.reports_tx.clone();

        tokio::spawn(async move {
            let report = run_worker(
                partition,
                config,
                streams,
                writers,
                store,
                metrics,
                worker_cancel,
            )
            .await;
            // The coordinator may already be gone during shutdown; that is
            // fine, the worker has finished its drain either way.
            let _ = reports_tx.send(report).await;
        });

        self.workers.insert(partition, handle);
    }

    /// Drain and stop the worker for a revoked partition
    fn stop_worker(&mut self, partition: PartitionId) {
        match self.workers.remove(&partition) {
            Some(handle) => {
                tracing::info!(partition = %partition, "partition revoked, draining worker");
                handle.cancel.cancel();
            }
            None => {
                tracing::warn!(partition = %partition, "revoke for unknown partition");
            }
        }
        self.restarts.remove(&partition);
    }

    /// React to a worker's final report
    fn handle_report(&mut self, report: WorkerReport) {
        let partition = report.partition;

        // A report for a partition no longer in the registry belongs to a
        // revoked worker finishing its drain; nothing left to decide.
        if !self.workers.contains_key(&partition) {
            tracing::debug!(
                partition = %partition,
                faulted = report.is_faulted(),
                checkpoint = report.checkpoint().map(|p| p.as_u64()),
                "late report for released partition"
            );
            return;
        }

        match report.outcome {
            WorkerOutcome::Stopped { checkpoint } => {
                tracing::info!(
                    partition = %partition,
                    checkpoint = checkpoint.map(|p| p.as_u64()),
                    "worker stopped"
                );
                self.workers.remove(&partition);
                self.restarts.remove(&partition);
            }
            WorkerOutcome::Faulted { fault, checkpoint } => {
                self.handle_fault(partition, fault, checkpoint.map(|p| p.as_u64()));
            }
        }
    }

    fn handle_fault(&mut self, partition: PartitionId, fault: WorkerFault, checkpoint: Option<u64>) {
        tracing::error!(
            partition = %partition,
            fault = %fault,
            checkpoint,
            "worker faulted"
        );

        match self.fault_policy {
            FaultPolicy::Release => {
                tracing::info!(partition = %partition, "releasing faulted partition");
                self.workers.remove(&partition);
                self.restarts.remove(&partition);
            }
            FaultPolicy::Restart { max_restarts } => {
                let count = self.restarts.entry(partition).or_insert(0);
                *count += 1;

                if *count > max_restarts {
                    tracing::error!(
                        partition = %partition,
                        restarts = *count - 1,
                        "restart budget exhausted, releasing partition"
                    );
                    self.workers.remove(&partition);
                    self.restarts.remove(&partition);
                } else {
                    tracing::info!(
                        partition = %partition,
                        restart = *count,
                        max_restarts,
                        checkpoint,
                        "restarting worker from last durable checkpoint"
                    );
                    self.workers.remove(&partition);
                    self.spawn(partition);
                }
            }
        }
    }

    /// Cancel all workers and collect their final reports
    async fn shutdown(&mut self, reports_rx: &mut mpsc::Receiver<WorkerReport>) {
        tracing::info!(workers = self.workers.len(), "stopping all workers");

        for handle in self.workers.values() {
            handle.cancel.cancel();
        }

        let deadline = self.config.drain_grace + SHUTDOWN_REPORT_MARGIN;
        let wait = async {
            while !self.workers.is_empty() {
                match reports_rx.recv().await {
                    Some(report) => {
                        tracing::info!(
                            partition = %report.partition,
                            faulted = report.is_faulted(),
                            checkpoint = report.checkpoint().map(|p| p.as_u64()),
                            "worker finished during shutdown"
                        );
                        self.workers.remove(&report.partition);
                    }
                    None => break,
                }
            }
        };

        if tokio::time::timeout(deadline, wait).await.is_err() {
            tracing::warn!(
                stragglers = self.workers.len(),
                "not all workers reported back within the shutdown deadline"
            );
        }

        tracing::info!("coordinator stopped");
    }
}

/// Build and run one worker; any startup failure becomes a fault report
async fn run_worker<F, WF, S>(
    partition: PartitionId,
    config: WorkerConfig,
    streams: Arc<F>,
    writers: Arc<WF>,
    store: Arc<S>,
    metrics: Arc<crate::metrics::WorkerMetrics>,
    cancel: CancellationToken,
) -> WorkerReport
where
    F: StreamFactory,
    WF: WriterFactory,
    S: CheckpointStore,
{
    let tracker = match CheckpointTracker::resume(partition, store).await {
        Ok(tracker) => tracker,
        Err(e) => {
            return WorkerReport {
                partition,
                outcome: WorkerOutcome::Faulted {
                    fault: WorkerFault::Startup(format!("checkpoint load: {e}")),
                    checkpoint: None,
                },
            };
        }
    };
    let checkpoint = tracker.position();

    let source = match streams.open(partition, checkpoint).await {
        Ok(source) => source,
        Err(e) => {
            return WorkerReport {
                partition,
                outcome: WorkerOutcome::Faulted {
                    fault: WorkerFault::Startup(format!("stream open: {e}")),
                    checkpoint,
                },
            };
        }
    };

    let writer = match writers.create(partition) {
        Ok(writer) => writer,
        Err(e) => {
            return WorkerReport {
                partition,
                outcome: WorkerOutcome::Faulted {
                    fault: WorkerFault::Startup(format!("writer create: {e}")),
                    checkpoint,
                },
            };
        }
    };

    PartitionWorker::new(partition, config, source, writer, tracker, metrics)
        .run(cancel)
        .await
}
