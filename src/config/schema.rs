//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every section has defaults so a partial (or empty) file is valid.

use serde::{Deserialize, Serialize};

use crate::delay::DelayStrategy;
use crate::session::Rewrite;

/// Root configuration of a fixture server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address and admission limit.
    pub listener: ListenerConfig,

    /// Where requests are sent.
    pub topology: TopologyConfig,

    /// Pause range of the synthetic endpoint.
    pub synthetic: SyntheticConfig,

    /// Delay/fault policy applied to responses.
    pub delay: DelayConfig,

    /// Phase timeouts.
    pub timeouts: TimeoutConfig,

    /// HTTP parser limits.
    pub http: HttpConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "localhost:8080").
    pub bind_address: String,

    /// Maximum concurrent sessions; 0 means unlimited.
    pub max_sessions: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "localhost:8080".to_string(),
            max_sessions: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyMode {
    #[default]
    Direct,
    Pipe,
    Synthetic,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopologyConfig {
    pub mode: TopologyMode,

    /// Destination `host:port` for direct and pipe modes.
    pub destination: String,

    /// Relay executable for pipe mode.
    pub relay_program: Option<String>,

    /// Arguments for the relay executable.
    pub relay_args: Vec<String>,

    /// Request rewriting.
    pub rewrite: Rewrite,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            mode: TopologyMode::Direct,
            destination: "localhost:8090".to_string(),
            relay_program: None,
            relay_args: Vec::new(),
            rewrite: Rewrite::None,
        }
    }
}

/// Signed so that non-positive values can be reported instead of failing to parse.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyntheticConfig {
    pub min_pause_ms: i64,
    pub max_pause_ms: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            min_pause_ms: 4000,
            max_pause_ms: 6000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DelayConfig {
    pub strategy: DelayStrategy,

    /// Fixed delay, or the gap between chunks.
    pub delay_ms: u64,

    /// Chunk size for `per-chunk`.
    pub chunk_size: usize,

    /// Body bytes sent before `truncate` closes the connection.
    pub cutoff_bytes: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            strategy: DelayStrategy::None,
            delay_ms: 1000,
            chunk_size: 1024,
            cutoff_bytes: 0,
        }
    }
}

/// Timeout configuration, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub request_ms: u64,
    pub upstream_ms: u64,
    pub drain_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            request_ms: 30_000,
            upstream_ms: 30_000,
            drain_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub max_line_bytes: usize,
    pub max_headers: usize,
    /// Largest upstream body collected for data-query reports.
    pub max_buffered_body: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 8 * 1024,
            max_headers: 100,
            max_buffered_body: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Trace this crate regardless of `log_level`.
    pub tracing: bool,

    /// Prometheus endpoint bind address; no exporter when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            tracing: false,
            metrics_address: None,
        }
    }
}
