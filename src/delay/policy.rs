//! Delay policy value object.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Strategy tag as it appears in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DelayStrategy {
    /// Pass bytes through untouched.
    #[default]
    None,
    /// Hold the whole response for one delay.
    Fixed,
    /// Release the body in fixed-size chunks, one delay apart.
    PerChunk,
    /// Close the connection after a number of body bytes.
    #[value(alias = "truncate-after-n-bytes")]
    #[serde(alias = "truncate-after-n-bytes")]
    Truncate,
}

/// How bytes bound for the client are released. Fixed for a session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayPolicy {
    #[default]
    None,
    Fixed {
        delay: Duration,
    },
    PerChunk {
        chunk_size: usize,
        delay: Duration,
    },
    TruncateAfter {
        bytes: u64,
    },
}

impl DelayPolicy {
    pub fn strategy(&self) -> DelayStrategy {
        match self {
            DelayPolicy::None => DelayStrategy::None,
            DelayPolicy::Fixed { .. } => DelayStrategy::Fixed,
            DelayPolicy::PerChunk { .. } => DelayStrategy::PerChunk,
            DelayPolicy::TruncateAfter { .. } => DelayStrategy::Truncate,
        }
    }
}

impl std::fmt::Display for DelayPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayPolicy::None => write!(f, "none"),
            DelayPolicy::Fixed { delay } => write!(f, "fixed({:?})", delay),
            DelayPolicy::PerChunk { chunk_size, delay } => {
                write!(f, "per-chunk({} bytes every {:?})", chunk_size, delay)
            }
            DelayPolicy::TruncateAfter { bytes } => write!(f, "truncate-after({} bytes)", bytes),
        }
    }
}
