//! TCP listener.
//!
//! # Responsibilities
//! - Bind to the configured `host:port`
//! - Accept inbound connections and wrap them as transport connections
//!
//! Admission control lives in [`crate::net::tracker`]; the listener itself
//! never blocks accepting.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::transport::{Connection, Direction, TransportError};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `address`, a `host:port` pair. Host names are resolved.
    pub async fn bind(address: &str) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: address.to_string(),
            source,
        };

        let inner = TcpListener::bind(address).await.map_err(bind_error)?;
        let local_addr = inner.local_addr().map_err(bind_error)?;

        tracing::info!(address = %local_addr, "Listener bound");
        Ok(Self { inner, local_addr })
    }

    /// Accept the next inbound connection.
    pub async fn accept(&self) -> Result<(Connection, SocketAddr), TransportError> {
        let (stream, peer) = self.inner.accept().await.map_err(TransportError::Accept)?;
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %peer, error = %err, "Failed to set TCP_NODELAY");
        }

        let conn = Connection::tcp(stream, Direction::Inbound);
        tracing::trace!(connection_id = %conn.id(), peer_addr = %peer, "Connection accepted");
        Ok((conn, peer))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn binds_ephemeral_port_and_accepts() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().port(), 0);

        let client = TcpStream::connect(listener.local_addr()).await.unwrap();
        let (conn, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
        assert_eq!(conn.direction(), Direction::Inbound);
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = Listener::bind("127.0.0.1:0").await.unwrap();
        let err = Listener::bind(&first.local_addr().to_string()).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
