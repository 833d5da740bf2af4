//! Configuration validation
//!
//! Catches values that would parse fine but misbehave at runtime.

use crate::error::{ConfigError, Result};
use crate::sink::SinkConfig;
use crate::Config;

/// Validate the full configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.pipeline.buffer_capacity_bytes == 0 {
        return Err(ConfigError::invalid(
            "pipeline.buffer_capacity_bytes",
            "must be greater than zero",
        ));
    }

    let threshold = config.pipeline.fill_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::invalid(
            "pipeline.fill_threshold",
            format!("must be in (0.0, 1.0], got {threshold}"),
        ));
    }

    if config.pipeline.drain_grace_secs == 0 {
        return Err(ConfigError::invalid(
            "pipeline.drain_grace_secs",
            "must be greater than zero",
        ));
    }

    if config.write_retry.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "write_retry.max_attempts",
            "must allow at least one attempt",
        ));
    }

    if config.checkpoint.retry.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "checkpoint.max_attempts",
            "must allow at least one attempt",
        ));
    }

    if config.hub.partitions == 0 {
        return Err(ConfigError::invalid(
            "hub.partitions",
            "must have at least one partition",
        ));
    }

    if config.simulator.enabled && config.simulator.devices == 0 {
        return Err(ConfigError::invalid(
            "simulator.devices",
            "an enabled simulator needs at least one device",
        ));
    }

    match &config.sink {
        SinkConfig::Null => {}
        SinkConfig::Blob(blob) => {
            if blob.path.is_empty() {
                return Err(ConfigError::invalid("sink.path", "must not be empty"));
            }
            if blob.max_file_bytes == 0 {
                return Err(ConfigError::invalid(
                    "sink.max_file_bytes",
                    "must be greater than zero",
                ));
            }
        }
        SinkConfig::Index(index) => {
            if !index.base_url.starts_with("http://") && !index.base_url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    "sink.base_url",
                    format!("must be an http(s) URL, got {:?}", index.base_url),
                ));
            }
            if index.index_prefix.is_empty() {
                return Err(ConfigError::invalid("sink.index_prefix", "must not be empty"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Config::from_str("[pipeline]\nbuffer_capacity_bytes = 0").unwrap_err();
        assert!(err.to_string().contains("buffer_capacity_bytes"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let err = Config::from_str("[pipeline]\nfill_threshold = 1.5").unwrap_err();
        assert!(err.to_string().contains("fill_threshold"));

        let err = Config::from_str("[pipeline]\nfill_threshold = 0.0").unwrap_err();
        assert!(err.to_string().contains("fill_threshold"));
    }

    #[test]
    fn test_bad_index_url_rejected() {
        let toml = "[sink]\ntype = \"index\"\nbase_url = \"search.internal:9200\"";
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let err = Config::from_str("[write_retry]\nmax_attempts = 0").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let err = Config::from_str("[hub]\npartitions = 0").unwrap_err();
        assert!(err.to_string().contains("partitions"));
    }
}
