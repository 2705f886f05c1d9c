//! Random pause used by the synthetic endpoint.

use std::time::Duration;

use rand::Rng;

/// Inclusive range of pauses, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRange {
    min_ms: u64,
    max_ms: u64,
}

impl PauseRange {
    /// `None` unless `0 < min <= max`.
    pub fn new(min_ms: u64, max_ms: u64) -> Option<Self> {
        if min_ms == 0 || min_ms > max_ms {
            return None;
        }
        Some(Self { min_ms, max_ms })
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Draw a pause uniformly from the range.
    pub fn sample(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

impl Default for PauseRange {
    fn default() -> Self {
        Self {
            min_ms: 4000,
            max_ms: 6000,
        }
    }
}
