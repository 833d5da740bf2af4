//! Metrics reporting section

use serde::Deserialize;

/// Metrics reporter settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether periodic reporting is enabled
    pub enabled: bool,

    /// Interval between reports in seconds
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
        }
    }
}
