//! Scenario simulator - synthetic device traffic for a `MemoryHub`
//!
//! Drives a configured fleet of simulated devices, each publishing a telemetry
//! reading on its own interval. Used by the demo host and load-style tests in
//! place of a real device population. Send failures are logged and counted,
//! never fatal to the fleet.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::Serialize;
use silo_protocol::PartitionId;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::hub::MemoryHub;

/// Simulator settings
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Number of simulated devices
    pub device_count: u32,

    /// Delay between consecutive events from one device
    pub event_interval: Duration,

    /// Events each device publishes before stopping (0 = until cancelled)
    pub events_per_device: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            device_count: 8,
            event_interval: Duration::from_millis(100),
            events_per_device: 0,
        }
    }
}

/// One telemetry reading, serialized as the event payload
#[derive(Debug, Serialize)]
struct Reading<'a> {
    device_id: &'a str,
    tick: u64,
    temperature: f64,
}

/// Counters shared by all device tasks
#[derive(Debug, Default)]
pub struct SimulatorMetrics {
    /// Events successfully published to the hub
    pub events_sent: AtomicU64,

    /// Publish attempts that failed (partition closed)
    pub send_failures: AtomicU64,
}

impl SimulatorMetrics {
    /// Events successfully published so far
    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }

    /// Failed publish attempts so far
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

/// Synthetic device fleet publishing into a hub
pub struct Simulator {
    hub: MemoryHub,
    config: SimulatorConfig,
    metrics: Arc<SimulatorMetrics>,
}

impl Simulator {
    /// Create a simulator over `hub`
    pub fn new(hub: MemoryHub, config: SimulatorConfig) -> Self {
        Self {
            hub,
            config,
            metrics: Arc::new(SimulatorMetrics::default()),
        }
    }

    /// Shared counters (valid after `run` consumes the simulator)
    pub fn metrics(&self) -> Arc<SimulatorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the fleet until every device finishes or `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let partition_count = self.hub.partition_count().max(1);

        tracing::info!(
            devices = self.config.device_count,
            partitions = partition_count,
            interval_ms = self.config.event_interval.as_millis() as u64,
            "simulator starting"
        );

        let mut devices = JoinSet::new();
        for index in 0..self.config.device_count {
            let hub = self.hub.clone();
            let config = self.config.clone();
            let metrics = Arc::clone(&self.metrics);
            let cancel = cancel.clone();
            let partition = PartitionId::new(index % partition_count);

            devices.spawn(run_device(index, partition, hub, config, metrics, cancel));
        }

        while devices.join_next().await.is_some() {}

        tracing::info!(
            events_sent = self.metrics.events_sent(),
            send_failures = self.metrics.send_failures(),
            "simulator stopped"
        );
    }
}

async fn run_device(
    index: u32,
    partition: PartitionId,
    hub: MemoryHub,
    config: SimulatorConfig,
    metrics: Arc<SimulatorMetrics>,
    cancel: CancellationToken,
) {
    let device_id = format!("sim-{index:04}");
    let mut tick: u64 = 0;

    loop {
        if config.events_per_device != 0 && tick >= config.events_per_device {
            break;
        }

        let reading = Reading {
            device_id: &device_id,
            tick,
            temperature: temperature_at(index, tick),
        };
        let payload = serde_json::to_vec(&reading).expect("reading serializes");

        match hub.publish(partition, Some(now_ms()), Bytes::from(payload)) {
            Ok(_) => {
                metrics.events_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    device = %device_id,
                    partition = %partition,
                    error = %e,
                    "publish failed, stopping device"
                );
                break;
            }
        }

        tick += 1;

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.event_interval) => {}
        }
    }

    tracing::debug!(device = %device_id, events = tick, "device finished");
}

/// Deterministic wobble around a 21°C baseline, distinct per device
fn temperature_at(device: u32, tick: u64) -> f64 {
    let phase = (device as u64).wrapping_mul(7919).wrapping_add(tick) % 100;
    21.0 + (phase as f64 - 50.0) / 25.0
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_run_publishes_everything() {
        let hub = MemoryHub::new(2);
        let simulator = Simulator::new(
            hub.clone(),
            SimulatorConfig {
                device_count: 4,
                event_interval: Duration::from_millis(1),
                events_per_device: 5,
            },
        );
        let metrics = simulator.metrics();

        simulator.run(CancellationToken::new()).await;

        assert_eq!(metrics.events_sent(), 20);
        assert_eq!(metrics.send_failures(), 0);
        // Devices alternate partitions: 2 devices × 5 events each.
        assert_eq!(hub.published_count(PartitionId::new(0)), 10);
        assert_eq!(hub.published_count(PartitionId::new(1)), 10);
    }

    #[tokio::test]
    async fn test_cancel_stops_fleet() {
        let hub = MemoryHub::new(1);
        let simulator = Simulator::new(
            hub.clone(),
            SimulatorConfig {
                device_count: 2,
                event_interval: Duration::from_secs(60),
                events_per_device: 0,
            },
        );
        let metrics = simulator.metrics();

        let cancel = CancellationToken::new();
        cancel.cancel();
        simulator.run(cancel).await;

        // Each device publishes its first reading before observing the
        // cancellation in the interval sleep.
        assert_eq!(metrics.events_sent(), 2);
    }

    #[test]
    fn test_temperature_is_deterministic() {
        assert_eq!(temperature_at(3, 10), temperature_at(3, 10));
        assert!((temperature_at(0, 0) - temperature_at(1, 0)).abs() > f64::EPSILON);
    }
}
