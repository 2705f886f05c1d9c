//! Controllable HTTP test fixtures.
//!
//! A small engine that accepts HTTP/1.1 connections and either answers them
//! itself after a random pause or bridges them to a destination, directly or
//! through a relay process, while shaping the response timing.
//!
//! The binaries under `src/bin` are thin presets over [`cli::run`].

pub mod cli;
pub mod config;
pub mod delay;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod server;
pub mod session;
pub mod transport;

pub use config::schema::ServerConfig;
pub use error::Error;
pub use lifecycle::Shutdown;
pub use server::{DrainReport, Server, ServerSettings};
pub use session::{BridgeTopology, SessionContext};
