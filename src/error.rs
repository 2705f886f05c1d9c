//! Errors surfaced by the binaries.

use thiserror::Error;

use crate::config::ConfigError;
use crate::net::ListenerError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listen(#[from] ListenerError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
