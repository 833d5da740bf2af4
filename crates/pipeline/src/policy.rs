//! Flush policy - when is a buffer full enough?
//!
//! Pure and stateless given its inputs, so it is independently testable: the
//! worker feeds it the buffer fill ratio, the time since the last flush, and
//! whether an explicit flush (shutdown drain, forced flush) was requested.

use std::time::Duration;

use crate::{DEFAULT_FILL_THRESHOLD, DEFAULT_MAX_FLUSH_INTERVAL_SECS};

/// Decides whether a flush is due
///
/// Triggers on whichever comes first:
/// - fill ratio reaching `fill_threshold` (flush-near-full, so the next
///   append does not bounce off a full buffer)
/// - `max_interval` elapsing since the last flush (bounds staleness on
///   low-throughput partitions)
/// - an explicit request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushPolicy {
    /// Fill ratio in `[0.0, 1.0]` at which a flush becomes due
    pub fill_threshold: f64,

    /// Maximum time between flushes
    pub max_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            fill_threshold: DEFAULT_FILL_THRESHOLD,
            max_interval: Duration::from_secs(DEFAULT_MAX_FLUSH_INTERVAL_SECS),
        }
    }
}

impl FlushPolicy {
    /// Create a policy with explicit settings
    pub fn new(fill_threshold: f64, max_interval: Duration) -> Self {
        Self {
            fill_threshold,
            max_interval,
        }
    }

    /// Whether a flush is due
    #[inline]
    pub fn should_flush(
        &self,
        fill_ratio: f64,
        since_last_flush: Duration,
        explicit_request: bool,
    ) -> bool {
        explicit_request
            || fill_ratio >= self.fill_threshold
            || since_last_flush >= self.max_interval
    }
}
