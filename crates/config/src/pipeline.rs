//! Pipeline section: buffering, flush triggers, drain, fault policy

use serde::Deserialize;

/// Buffering and flush settings, one set shared by all partition workers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-partition frame buffer capacity in bytes
    pub buffer_capacity_bytes: usize,

    /// Buffer fill ratio that triggers a flush
    pub fill_threshold: f64,

    /// Maximum time between flushes on a quiet partition
    pub max_flush_interval_secs: u64,

    /// How long a receive may sit idle before re-checking the time trigger
    pub receive_idle_ms: u64,

    /// Per-attempt sink write timeout
    pub write_timeout_secs: u64,

    /// Time budget for the shutdown drain
    pub drain_grace_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity_bytes: 4 * 1024 * 1024,
            fill_threshold: 0.9,
            max_flush_interval_secs: 30,
            receive_idle_ms: 1_000,
            write_timeout_secs: 10,
            drain_grace_secs: 10,
        }
    }
}

/// What the coordinator does with a faulted partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicyKind {
    /// Restart from the last durable checkpoint (bounded)
    Restart,

    /// Relinquish the partition
    Release,
}

/// Fault handling section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Restart or release
    pub policy: FaultPolicyKind,

    /// Restart budget per partition (only used with `policy = "restart"`)
    pub max_restarts: u32,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            policy: FaultPolicyKind::Restart,
            max_restarts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_capacity_bytes, 4 * 1024 * 1024);
        assert!((config.fill_threshold - 0.9).abs() < f64::EPSILON);

        let fault = FaultConfig::default();
        assert_eq!(fault.policy, FaultPolicyKind::Restart);
        assert_eq!(fault.max_restarts, 3);
    }
}
