//! Sink section: where flushed blocks go
//!
//! Exactly one sink is active per process; the pipeline's at-least-once
//! contract is between each partition worker and this destination.

use serde::Deserialize;

/// The destination for flushed blocks
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Discard everything (benchmarks)
    Null,

    /// Rolling append-only block files
    Blob(BlobSinkConfig),

    /// HTTP bulk-index endpoint
    Index(IndexSinkConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::Blob(BlobSinkConfig::default())
    }
}

impl SinkConfig {
    /// The sink type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Blob(_) => "blob",
            Self::Index(_) => "index",
        }
    }
}

/// Rolling blob file sink settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobSinkConfig {
    /// Root directory for block files
    pub path: String,

    /// Roll to a new file when the current one would exceed this size
    pub max_file_bytes: u64,
}

impl Default for BlobSinkConfig {
    fn default() -> Self {
        Self {
            path: "blocks".into(),
            max_file_bytes: 64 * 1024 * 1024,
        }
    }
}

/// HTTP bulk-index sink settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSinkConfig {
    /// Endpoint base URL
    pub base_url: String,

    /// Index name prefix; the partition id is appended per writer
    pub index_prefix: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for IndexSinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".into(),
            index_prefix: "events".into(),
            request_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_parse() {
        let blob: SinkConfig = toml::from_str("type = \"blob\"\npath = \"data/\"").unwrap();
        match blob {
            SinkConfig::Blob(ref c) => assert_eq!(c.path, "data/"),
            ref other => panic!("expected blob, got {other:?}"),
        }

        let null: SinkConfig = toml::from_str("type = \"null\"").unwrap();
        assert_eq!(null.type_name(), "null");
    }
}
