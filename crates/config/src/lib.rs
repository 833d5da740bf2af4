//! Silo Configuration
//!
//! TOML-based configuration loading with sensible defaults. A minimal config
//! should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use silo_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[sink]\ntype = \"null\"").unwrap();
//! ```
//!
//! # Example Minimal Config
//!
//! ```toml
//! [hub]
//! partitions = 4
//!
//! [sink]
//! type = "blob"
//! path = "blocks/"
//! ```

mod error;
mod hub;
mod logging;
mod metrics;
mod pipeline;
mod retry;
mod sink;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use hub::{HubConfig, SimulatorConfig};
pub use logging::LogConfig;
pub use metrics::MetricsConfig;
pub use pipeline::{FaultConfig, FaultPolicyKind, PipelineConfig};
pub use retry::RetryConfig;
pub use sink::{BlobSinkConfig, IndexSinkConfig, SinkConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Buffering, flush triggers, and shutdown drain
    pub pipeline: PipelineConfig,

    /// Sink write retry/backoff
    pub write_retry: RetryConfig,

    /// Checkpoint store location and persist retry
    pub checkpoint: CheckpointConfig,

    /// What to do when a partition worker faults
    pub fault: FaultConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// In-process hub settings (partition count)
    pub hub: HubConfig,

    /// Synthetic load generation
    pub simulator: SimulatorConfig,

    /// The destination for flushed blocks
    pub sink: SinkConfig,
}

/// Checkpoint storage and persist-retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory for the file-backed store; empty means in-memory only
    pub store_dir: String,

    /// Persist retry/backoff
    #[serde(flatten)]
    pub retry: RetryConfig,

    /// Per-attempt persist timeout
    pub timeout_secs: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            store_dir: "checkpoints".into(),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 100,
                max_delay_ms: 2_000,
            },
            timeout_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert!(config.pipeline.buffer_capacity_bytes > 0);
        assert_eq!(config.hub.partitions, 4);
        assert!(matches!(config.sink, SinkConfig::Blob(_)));
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[pipeline]
buffer_capacity_bytes = 1048576
fill_threshold = 0.8
max_flush_interval_secs = 15
receive_idle_ms = 500
drain_grace_secs = 5

[write_retry]
max_attempts = 4
base_delay_ms = 50
max_delay_ms = 2000

[checkpoint]
store_dir = "state/checkpoints"
max_attempts = 2

[fault]
policy = "release"

[log]
level = "debug"

[metrics]
enabled = true
interval_secs = 5

[hub]
partitions = 8

[simulator]
enabled = true
devices = 16
event_interval_ms = 50

[sink]
type = "index"
base_url = "http://search.internal:9200"
index_prefix = "telemetry"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.pipeline.buffer_capacity_bytes, 1_048_576);
        assert!((config.pipeline.fill_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.write_retry.max_attempts, 4);
        assert_eq!(config.checkpoint.store_dir, "state/checkpoints");
        assert_eq!(config.checkpoint.retry.max_attempts, 2);
        assert_eq!(config.fault.policy, FaultPolicyKind::Release);
        assert_eq!(config.hub.partitions, 8);
        assert_eq!(config.simulator.devices, 16);

        match config.sink {
            SinkConfig::Index(ref index) => {
                assert_eq!(index.base_url, "http://search.internal:9200");
                assert_eq!(index.index_prefix, "telemetry");
            }
            ref other => panic!("expected index sink, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(Config::from_str("not { valid").is_err());
    }
}
