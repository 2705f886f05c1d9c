//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over configured levels
//! - `--tracing` raises this crate to `trace` without touching dependencies
//! - The relay logs to stderr because its stdout carries HTTP bytes

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

/// Filter directive for a configured level.
pub fn filter_directive(level: &str, trace: bool) -> String {
    if trace {
        format!("{},{}=trace", level, env!("CARGO_CRATE_NAME"))
    } else {
        level.to_string()
    }
}

/// Install the global subscriber. A second call leaves the first one in place.
pub fn init_logging(level: &str, trace: bool, target: LogTarget) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_directive(level, trace).into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match target {
        LogTarget::Stdout => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogTarget::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("Logging already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_flag_targets_this_crate() {
        assert_eq!(filter_directive("info", false), "info");
        assert_eq!(filter_directive("warn", true), "warn,bridge_servers=trace");
    }
}
