//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pauses ordered, ports valid)
//! - Check mode-specific requirements (pipe needs a relay program)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServerConfig, TopologyMode};
use crate::delay::DelayStrategy;

/// Smallest accepted `http.max_line_bytes`.
pub const MIN_LINE_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Split `host:port`. The host may be a bracketed IPv6 literal.
pub fn parse_host_port(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    port.parse().ok().map(|port| (host, port))
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if parse_host_port(&config.listener.bind_address).is_none() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not host:port", config.listener.bind_address),
        ));
    }

    let topology = &config.topology;
    if topology.mode != TopologyMode::Synthetic {
        match parse_host_port(&topology.destination) {
            Some((_, 0)) | None => errors.push(ValidationError::new(
                "topology.destination",
                format!("'{}' is not host:port", topology.destination),
            )),
            Some(_) => {}
        }
    }
    if topology.mode == TopologyMode::Pipe
        && topology.relay_program.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::new("topology.relay_program", "pipe mode needs a relay program"));
    }

    let synthetic = &config.synthetic;
    if synthetic.min_pause_ms <= 0 {
        errors.push(ValidationError::new(
            "synthetic.min_pause_ms",
            "minimal pause can't be less or equal to 0",
        ));
    }
    if synthetic.max_pause_ms <= 0 {
        errors.push(ValidationError::new(
            "synthetic.max_pause_ms",
            "maximal pause can't be less or equal to 0",
        ));
    }
    if synthetic.max_pause_ms < synthetic.min_pause_ms {
        errors.push(ValidationError::new(
            "synthetic.max_pause_ms",
            "maximal pause can't be less than minimal pause",
        ));
    }

    if config.delay.strategy == DelayStrategy::PerChunk && config.delay.chunk_size == 0 {
        errors.push(ValidationError::new("delay.chunk_size", "must be > 0 for per-chunk delay"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_ms", timeouts.connect_ms),
        ("timeouts.request_ms", timeouts.request_ms),
        ("timeouts.upstream_ms", timeouts.upstream_ms),
        ("timeouts.drain_ms", timeouts.drain_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    let http = &config.http;
    if http.max_line_bytes < MIN_LINE_BYTES {
        errors.push(ValidationError::new(
            "http.max_line_bytes",
            format!("must be at least {}", MIN_LINE_BYTES),
        ));
    }
    if http.max_headers == 0 {
        errors.push(ValidationError::new("http.max_headers", "must be > 0"));
    }
    if http.max_buffered_body == 0 {
        errors.push(ValidationError::new("http.max_buffered_body", "must be > 0"));
    }

    let observability = &config.observability;
    if tracing_subscriber::EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("'{}' is not a valid level or filter", observability.log_level),
        ));
    }
    if let Some(address) = &observability.metrics_address {
        if address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("'{}' is not a socket address", address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
