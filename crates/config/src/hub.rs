//! Hub and simulator sections (the demo transport)

use serde::Deserialize;

/// In-process hub settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Number of partitions
    pub partitions: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { partitions: 4 }
    }
}

/// Synthetic device fleet settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Whether the simulator runs at all
    pub enabled: bool,

    /// Number of simulated devices
    pub devices: u32,

    /// Delay between consecutive events from one device
    pub event_interval_ms: u64,

    /// Events each device publishes before stopping (0 = until shutdown)
    pub events_per_device: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            devices: 8,
            event_interval_ms: 100,
            events_per_device: 0,
        }
    }
}
