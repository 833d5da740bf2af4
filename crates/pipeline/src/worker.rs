//! Partition worker - owns one partition's receive/flush/checkpoint loop
//!
//! State machine: `Idle → Receiving → Flushing → CheckpointPending →
//! Receiving` with `Faulted` and `Stopped` terminal. Flush and checkpoint for
//! one block fully complete (or fault) before the next block is opened, which
//! is what keeps the checkpoint behind durable data at all times.
//!
//! Backpressure falls out of the structure: the worker only pulls the next
//! event after the previous one is buffered, and an append refused for
//! capacity forces a full flush/checkpoint round-trip first. A slow sink
//! therefore slows the receive loop instead of growing memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use silo_protocol::{AppendOutcome, Frame, FrameBuffer, PartitionId, StreamPosition};
use silo_sinks::{BlockWriter, SinkError};
use silo_transport::{CheckpointStore, PartitionSource, Received};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{Advance, CheckpointTracker};
use crate::error::{CheckpointError, WorkerFault};
use crate::metrics::WorkerMetrics;
use crate::policy::FlushPolicy;
use crate::retry::RetryPolicy;
use crate::{DEFAULT_BUFFER_CAPACITY, DEFAULT_DRAIN_GRACE_SECS};

/// Backoff bounds for transient receive failures (not configurable; the
/// transport either recovers quickly or eventually reports a hard error)
const RECEIVE_RETRY_BASE: Duration = Duration::from_millis(100);
const RECEIVE_RETRY_MAX: Duration = Duration::from_secs(5);

/// Per-worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Frame buffer capacity in bytes
    pub buffer_capacity: usize,

    /// When to flush
    pub flush: FlushPolicy,

    /// How long a receive may sit idle before the worker wakes to re-check
    /// the time-based flush trigger
    pub receive_idle: Duration,

    /// Bounded retry for sink writes
    pub write_retry: RetryPolicy,

    /// Per-attempt sink write timeout
    pub write_timeout: Duration,

    /// Bounded retry for checkpoint persists
    pub checkpoint_retry: RetryPolicy,

    /// Per-attempt checkpoint persist timeout
    pub checkpoint_timeout: Duration,

    /// Time budget for the shutdown drain
    pub drain_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            flush: FlushPolicy::default(),
            receive_idle: Duration::from_secs(1),
            write_retry: RetryPolicy::default(),
            write_timeout: Duration::from_secs(10),
            checkpoint_retry: RetryPolicy::new(
                3,
                Duration::from_millis(100),
                Duration::from_secs(2),
            ),
            checkpoint_timeout: Duration::from_secs(5),
            drain_grace: Duration::from_secs(DEFAULT_DRAIN_GRACE_SECS),
        }
    }
}

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet running
    Idle,
    /// Pulling events and filling the buffer
    Receiving,
    /// Writing a snapshotted block to the sink
    Flushing,
    /// Block durable; persisting the checkpoint
    CheckpointPending,
    /// Gave up; fault reported to the coordinator
    Faulted,
    /// Clean exit (drain finished or partition ended)
    Stopped,
}

/// How a worker's life ended
#[derive(Debug)]
pub enum WorkerOutcome {
    /// Clean stop; `checkpoint` is the last durable position
    Stopped { checkpoint: Option<StreamPosition> },

    /// The worker faulted; `checkpoint` is the last known-good position
    Faulted {
        fault: WorkerFault,
        checkpoint: Option<StreamPosition>,
    },
}

/// Final report delivered to the coordinator
#[derive(Debug)]
pub struct WorkerReport {
    /// The partition this worker owned
    pub partition: PartitionId,

    /// How it ended
    pub outcome: WorkerOutcome,
}

impl WorkerReport {
    /// The last durable checkpoint at exit
    pub fn checkpoint(&self) -> Option<StreamPosition> {
        match &self.outcome {
            WorkerOutcome::Stopped { checkpoint } | WorkerOutcome::Faulted { checkpoint, .. } => {
                *checkpoint
            }
        }
    }

    /// Whether the worker faulted
    pub fn is_faulted(&self) -> bool {
        matches!(self.outcome, WorkerOutcome::Faulted { .. })
    }
}

/// Internal result of a flush round-trip
enum FlushError {
    /// Hard failure; the partition faults
    Fault(WorkerFault),

    /// Cancellation observed mid-flush; the in-flight block is abandoned
    /// (not checkpointed, so a restart replays it)
    Interrupted,
}

/// Internal result of one receive step
enum Step {
    Continue,
    EndOfStream,
}

/// One partition's receive/flush/checkpoint loop
pub struct PartitionWorker<T, W, S> {
    partition: PartitionId,
    config: WorkerConfig,
    source: T,
    writer: W,
    tracker: CheckpointTracker<S>,
    buffer: FrameBuffer,
    metrics: Arc<WorkerMetrics>,
    state: WorkerState,
    last_flush: Instant,
    transport_errors: u32,
}

impl<T, W, S> PartitionWorker<T, W, S>
where
    T: PartitionSource,
    W: BlockWriter,
    S: CheckpointStore,
{
    /// Create a worker over an opened source, writer, and resumed tracker
    pub fn new(
        partition: PartitionId,
        config: WorkerConfig,
        source: T,
        writer: W,
        tracker: CheckpointTracker<S>,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        let buffer = FrameBuffer::new(partition, config.buffer_capacity);
        Self {
            partition,
            config,
            source,
            writer,
            tracker,
            buffer,
            metrics,
            state: WorkerState::Idle,
            last_flush: Instant::now(),
            transport_errors: 0,
        }
    }

    /// The last durable checkpoint
    pub fn checkpoint(&self) -> Option<StreamPosition> {
        self.tracker.position()
    }

    /// Run until cancellation, end of partition, or fault
    pub async fn run(mut self, cancel: CancellationToken) -> WorkerReport {
        self.transition(WorkerState::Receiving);
        tracing::info!(
            partition = %self.partition,
            buffer_capacity = self.buffer.capacity(),
            resume_from = self.tracker.position().map(|p| p.as_u64()),
            "partition worker started"
        );

        let outcome = loop {
            if cancel.is_cancelled() {
                break self.drain().await;
            }

            if self.flush_due(false) {
                match self.flush_and_checkpoint(&cancel).await {
                    Ok(()) => {}
                    Err(FlushError::Interrupted) => break self.drain().await,
                    Err(FlushError::Fault(fault)) => break self.fault_outcome(fault),
                }
            }

            match self.receive(&cancel).await {
                Ok(Step::Continue) => {}
                Ok(Step::EndOfStream) => {
                    tracing::info!(partition = %self.partition, "partition ended, flushing remainder");
                    break match self.flush_and_checkpoint(&cancel).await {
                        Ok(()) => {
                            self.transition(WorkerState::Stopped);
                            WorkerOutcome::Stopped {
                                checkpoint: self.tracker.position(),
                            }
                        }
                        Err(FlushError::Interrupted) => self.drain().await,
                        Err(FlushError::Fault(fault)) => self.fault_outcome(fault),
                    };
                }
                Err(FlushError::Interrupted) => break self.drain().await,
                Err(FlushError::Fault(fault)) => break self.fault_outcome(fault),
            }
        };

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            partition = %self.partition,
            state = ?self.state,
            checkpoint = self.tracker.position().map(|p| p.as_u64()),
            events_received = snapshot.events_received,
            blocks_flushed = snapshot.blocks_flushed,
            bytes_flushed = snapshot.bytes_flushed,
            "partition worker exiting"
        );

        WorkerReport {
            partition: self.partition,
            outcome,
        }
    }

    /// Pull one event (or wake idle), feeding the buffer
    async fn receive(&mut self, cancel: &CancellationToken) -> Result<Step, FlushError> {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => return Err(FlushError::Interrupted),
                r = tokio::time::timeout(self.config.receive_idle, self.source.next()) => r,
            };

            match received {
                // Idle wake: give the time-based flush trigger a chance.
                Err(_elapsed) => return Ok(Step::Continue),
                Ok(Ok(Received::Event(event))) => {
                    self.transport_errors = 0;
                    self.ingest(Frame::from_event(&event), cancel).await?;
                    return Ok(Step::Continue);
                }
                Ok(Ok(Received::EndOfPartition)) => return Ok(Step::EndOfStream),
                Ok(Err(e)) if e.is_transient() => {
                    self.transport_errors = self.transport_errors.saturating_add(1);
                    let delay = receive_backoff(self.transport_errors);
                    tracing::warn!(
                        partition = %self.partition,
                        error = %e,
                        consecutive = self.transport_errors,
                        delay_ms = delay.as_millis() as u64,
                        "transient transport failure, retrying receive"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(FlushError::Interrupted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Ok(Err(e)) => return Err(FlushError::Fault(WorkerFault::Transport(e))),
            }
        }
    }

    /// Append one frame, flushing first if it does not fit
    async fn ingest(&mut self, frame: Frame, cancel: &CancellationToken) -> Result<(), FlushError> {
        self.metrics.event_received();

        if !self.buffer.can_ever_fit(frame.encoded_len()) {
            self.metrics.frame_oversized();
            tracing::error!(
                partition = %self.partition,
                position = %frame.position(),
                frame_bytes = frame.encoded_len(),
                buffer_capacity = self.buffer.capacity(),
                "frame exceeds buffer capacity, dropping event"
            );
            return Ok(());
        }

        match self.buffer.append(&frame) {
            AppendOutcome::Appended => {
                self.metrics.frame_appended();
            }
            AppendOutcome::WouldOverflow => {
                // The pending event is not consumed by the flush; it is
                // retried against the emptied buffer.
                self.flush_and_checkpoint(cancel).await?;
                match self.buffer.append(&frame) {
                    AppendOutcome::Appended => {
                        self.metrics.frame_appended();
                    }
                    AppendOutcome::WouldOverflow => {
                        // Guarded by can_ever_fit against an empty buffer.
                        self.metrics.frame_oversized();
                        tracing::error!(
                            partition = %self.partition,
                            position = %frame.position(),
                            "frame does not fit an empty buffer, dropping event"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether the flush policy fires right now
    fn flush_due(&self, explicit: bool) -> bool {
        !self.buffer.is_empty()
            && self.config.flush.should_flush(
                self.buffer.fill_ratio(),
                self.last_flush.elapsed(),
                explicit,
            )
    }

    /// One full flush round-trip: snapshot, write with retry, checkpoint
    async fn flush_and_checkpoint(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(), FlushError> {
        self.transition(WorkerState::Flushing);

        let Some(block) = self.buffer.snapshot_and_reset() else {
            self.last_flush = Instant::now();
            self.transition(WorkerState::Receiving);
            return Ok(());
        };

        tracing::debug!(
            partition = %self.partition,
            watermark = %block.watermark(),
            frames = block.frame_count(),
            bytes = block.len(),
            "flushing block"
        );

        if let Err(e) = self.write_with_retry(&block, cancel).await {
            match &e {
                FlushError::Fault(_) => self.metrics.block_failed(),
                FlushError::Interrupted => tracing::warn!(
                    partition = %self.partition,
                    watermark = %block.watermark(),
                    "flush interrupted by shutdown, block not checkpointed and will be replayed"
                ),
            }
            return Err(e);
        }

        self.transition(WorkerState::CheckpointPending);
        if let Err(e) = self.advance_with_retry(block.watermark(), cancel).await {
            if matches!(e, FlushError::Interrupted) {
                tracing::warn!(
                    partition = %self.partition,
                    watermark = %block.watermark(),
                    "checkpoint interrupted by shutdown, durable block will be replayed"
                );
            }
            return Err(e);
        }

        self.last_flush = Instant::now();
        self.transition(WorkerState::Receiving);
        Ok(())
    }

    /// Write one block, retrying retryable failures up to the attempt cap
    async fn write_with_retry(
        &mut self,
        block: &silo_protocol::Block,
        cancel: &CancellationToken,
    ) -> Result<(), FlushError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if attempts > 1 {
                self.metrics.flush_retry();
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(FlushError::Interrupted),
                r = tokio::time::timeout(self.config.write_timeout, self.writer.write(block)) => r,
            };

            let error = match result {
                Ok(Ok(())) => {
                    self.metrics.block_flushed(block.len() as u64);
                    tracing::debug!(
                        partition = %self.partition,
                        watermark = %block.watermark(),
                        attempts,
                        "block written"
                    );
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => SinkError::Timeout,
            };

            if error.is_retryable() && self.config.write_retry.allows_retry(attempts) {
                let delay = self.config.write_retry.delay_for(attempts);
                tracing::warn!(
                    partition = %self.partition,
                    watermark = %block.watermark(),
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "sink write failed, will retry"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FlushError::Interrupted),
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }

            tracing::error!(
                partition = %self.partition,
                watermark = %block.watermark(),
                attempts,
                error = %error,
                "sink write failed permanently"
            );
            return Err(FlushError::Fault(WorkerFault::SinkWrite {
                source: error,
                attempts,
            }));
        }
    }

    /// Persist the checkpoint, retried independently of the write
    async fn advance_with_retry(
        &mut self,
        watermark: StreamPosition,
        cancel: &CancellationToken,
    ) -> Result<(), FlushError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(FlushError::Interrupted),
                r = tokio::time::timeout(
                    self.config.checkpoint_timeout,
                    self.tracker.advance(watermark),
                ) => r,
            };

            let error = match result {
                Ok(Ok(advance)) => {
                    if advance == Advance::Advanced {
                        self.metrics.checkpoint_advanced();
                    }
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => CheckpointError::Timeout,
            };

            self.metrics.checkpoint_failure();

            if error.is_retryable() && self.config.checkpoint_retry.allows_retry(attempts) {
                let delay = self.config.checkpoint_retry.delay_for(attempts);
                tracing::warn!(
                    partition = %self.partition,
                    watermark = %watermark,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "checkpoint persist failed, will retry"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FlushError::Interrupted),
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }

            // The block is already durable; faulting (rather than silently
            // continuing) is what keeps restart-and-replay safe.
            tracing::error!(
                partition = %self.partition,
                watermark = %watermark,
                attempts,
                error = %error,
                "checkpoint persist failed permanently"
            );
            return Err(FlushError::Fault(WorkerFault::Checkpoint {
                source: error,
                attempts,
            }));
        }
    }

    /// Best-effort shutdown drain, bounded by the grace period
    async fn drain(&mut self) -> WorkerOutcome {
        tracing::info!(
            partition = %self.partition,
            buffered_frames = self.buffer.frame_count(),
            grace_ms = self.config.drain_grace.as_millis() as u64,
            "draining before stop"
        );

        // The drain itself is not cancellable; the grace timeout bounds it.
        let no_cancel = CancellationToken::new();
        let drained = tokio::time::timeout(
            self.config.drain_grace,
            self.flush_and_checkpoint(&no_cancel),
        )
        .await;

        match drained {
            Ok(Ok(())) => {
                self.transition(WorkerState::Stopped);
                WorkerOutcome::Stopped {
                    checkpoint: self.tracker.position(),
                }
            }
            Ok(Err(FlushError::Fault(fault))) => self.fault_outcome(fault),
            Ok(Err(FlushError::Interrupted)) => self.fault_outcome(WorkerFault::DrainTimedOut),
            Err(_elapsed) => {
                tracing::warn!(
                    partition = %self.partition,
                    "drain exceeded grace period, stopping with checkpoint unchanged"
                );
                self.fault_outcome(WorkerFault::DrainTimedOut)
            }
        }
    }

    fn fault_outcome(&mut self, fault: WorkerFault) -> WorkerOutcome {
        self.transition(WorkerState::Faulted);
        tracing::error!(
            partition = %self.partition,
            fault = %fault,
            checkpoint = self.tracker.position().map(|p| p.as_u64()),
            "partition worker faulted"
        );
        WorkerOutcome::Faulted {
            fault,
            checkpoint: self.tracker.position(),
        }
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            tracing::trace!(
                partition = %self.partition,
                from = ?self.state,
                to = ?next,
                "state transition"
            );
            self.state = next;
        }
    }
}

/// Capped exponential backoff for transient receive failures
fn receive_backoff(consecutive: u32) -> Duration {
    let shift = consecutive.saturating_sub(1).min(8);
    let delay_ms = (RECEIVE_RETRY_BASE.as_millis() as u64)
        .saturating_mul(1u64 << shift)
        .min(RECEIVE_RETRY_MAX.as_millis() as u64);
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_backoff_caps() {
        assert_eq!(receive_backoff(1), Duration::from_millis(100));
        assert_eq!(receive_backoff(2), Duration::from_millis(200));
        assert_eq!(receive_backoff(20), Duration::from_secs(5));
    }

    #[test]
    fn test_default_config_is_sane() {
        let config = WorkerConfig::default();
        assert!(config.buffer_capacity > 0);
        assert!(config.flush.fill_threshold > 0.0 && config.flush.fill_threshold <= 1.0);
        assert!(config.write_retry.max_attempts >= 1);
        assert!(config.drain_grace > Duration::ZERO);
    }
}
