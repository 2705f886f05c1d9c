//! Socket backend.

use std::io;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::transport::{Connection, Direction, TransportError};

/// Open an outbound connection to `target` (`host:port`), bounded by `timeout`.
pub async fn connect(target: &str, timeout: Duration) -> Result<Connection, TransportError> {
    let connect_error = |source: io::Error| TransportError::Connect {
        target: target.to_string(),
        source,
    };

    let stream = tokio::time::timeout(timeout, TcpStream::connect(target))
        .await
        .map_err(|_| connect_error(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")))?
        .map_err(connect_error)?;

    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(destination = target, error = %err, "Failed to set TCP_NODELAY");
    }

    let conn = Connection::tcp(stream, Direction::Outbound);
    tracing::trace!(connection_id = %conn.id(), destination = target, "Outbound connection established");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let conn = connect(&addr, Duration::from_secs(1)).await.unwrap();
        assert_eq!(conn.direction(), Direction::Outbound);
        assert_eq!(conn.kind(), "tcp");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect(&addr, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
