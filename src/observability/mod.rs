//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! sessions, dispatcher:
//!     → tracing spans and events (session id, peer, state transitions)
//!     → logging.rs (EnvFilter + fmt subscriber)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout / stderr
//!     → optional Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
