//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! net::listener accept ──┐
//! tcp::connect ──────────┼──▶ Connection { Tcp | Pipe } ──▶ http reader / writer
//! pipe::spawn_relay ─────┘
//! ```
//!
//! # Design Decisions
//! - One `Connection` type for both backends; upper layers never branch on it
//! - Backend-specific setup lives in the factory functions only
//! - `close` is idempotent and never reports failure

pub mod pipe;
pub mod tcp;

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

pub use pipe::{spawn_relay, PipeRelay, RelaySpec};
pub use tcp::connect;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accepted from a client.
    Inbound,
    /// Opened towards the destination.
    Outbound,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("relay {program} unavailable: {source}")]
    RelayUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Map an I/O error from a read or write, singling out peer disconnects.
    pub fn from_io(err: io::Error) -> Self {
        if is_disconnect(&err) {
            TransportError::PeerClosed
        } else {
            TransportError::Io(err)
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Io(err) => err.kind() == io::ErrorKind::TimedOut,
            TransportError::Connect { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    )
}

enum Backend {
    Tcp(TcpStream),
    Pipe(PipeRelay),
}

/// An established byte stream, socket or pipe backed.
///
/// Owned by exactly one session. Also usable as a plain
/// `AsyncRead + AsyncWrite`, which is how the HTTP layer consumes it.
pub struct Connection {
    id: ConnectionId,
    direction: Direction,
    backend: Backend,
    bytes_read: u64,
    bytes_written: u64,
    closed: bool,
}

impl Connection {
    pub fn tcp(stream: TcpStream, direction: Direction) -> Self {
        Self::with_backend(Backend::Tcp(stream), direction)
    }

    pub(crate) fn pipe(relay: PipeRelay) -> Self {
        Self::with_backend(Backend::Pipe(relay), Direction::Outbound)
    }

    fn with_backend(backend: Backend, direction: Direction) -> Self {
        Self {
            id: ConnectionId::next(),
            direction,
            backend,
            bytes_read: 0,
            bytes_written: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `"tcp"` or `"pipe"`, for logs.
    pub fn kind(&self) -> &'static str {
        match self.backend {
            Backend::Tcp(_) => "tcp",
            Backend::Pipe(_) => "pipe",
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.backend {
            Backend::Tcp(stream) => stream.peer_addr().ok(),
            Backend::Pipe(_) => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read cursor: bytes received so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Write cursor: bytes sent so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Read up to `max` bytes. An empty result means the peer closed gracefully.
    pub async fn read_chunk(&mut self, max: usize) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::with_capacity(max);
        let mut limited = (&mut *self).take(max as u64);
        limited
            .read_buf(&mut buf)
            .await
            .map_err(TransportError::from_io)?;
        Ok(buf.freeze())
    }

    /// Write all of `bytes`, returning how many were written.
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.write_all(bytes).await.map_err(TransportError::from_io)?;
        self.flush().await.map_err(TransportError::from_io)?;
        Ok(bytes.len())
    }

    /// Drop the connection so that a TCP peer sees a reset instead of a
    /// graceful close. Pipe connections are just dropped.
    pub fn abort(self) {
        if let Backend::Tcp(stream) = &self.backend {
            if let Err(err) = stream.set_linger(Some(Duration::ZERO)) {
                tracing::debug!(connection_id = %self.id, error = %err, "Failed to set SO_LINGER");
            }
        }
        tracing::trace!(connection_id = %self.id, kind = self.kind(), "Connection aborted");
    }

    /// Close the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match &mut self.backend {
            Backend::Tcp(stream) => {
                let _ = stream.shutdown().await;
            }
            Backend::Pipe(relay) => relay.close().await,
        }
        tracing::trace!(
            connection_id = %self.id,
            kind = self.kind(),
            bytes_read = self.bytes_read,
            bytes_written = self.bytes_written,
            "Connection closed"
        );
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("kind", &self.kind())
            .field("closed", &self.closed)
            .finish()
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = match &mut this.backend {
            Backend::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Backend::Pipe(relay) => Pin::new(relay).poll_read(cx, buf),
        };
        if let Poll::Ready(Ok(())) = poll {
            this.bytes_read += (buf.filled().len() - before) as u64;
        }
        poll
    }
}

impl AsyncWrite for Connection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = match &mut this.backend {
            Backend::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Backend::Pipe(relay) => Pin::new(relay).poll_write(cx, buf),
        };
        if let Poll::Ready(Ok(n)) = poll {
            this.bytes_written += n as u64;
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().backend {
            Backend::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Backend::Pipe(relay) => Pin::new(relay).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().backend {
            Backend::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Backend::Pipe(relay) => Pin::new(relay).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Connection::tcp(server, Direction::Inbound), client)
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::next(), ConnectionId::next());
    }

    #[tokio::test]
    async fn read_returns_empty_on_graceful_close() {
        let (mut conn, mut peer) = pair().await;
        peer.write_all(b"hello").await.unwrap();
        peer.shutdown().await.unwrap();

        assert_eq!(&conn.read_chunk(3).await.unwrap()[..], b"hel");
        assert_eq!(&conn.read_chunk(64).await.unwrap()[..], b"lo");
        assert!(conn.read_chunk(64).await.unwrap().is_empty());
        assert_eq!(conn.bytes_read(), 5);
    }

    #[tokio::test]
    async fn abort_resets_tcp_peer() {
        let (conn, mut peer) = pair().await;
        conn.abort();

        let mut received = Vec::new();
        let err = peer.read_to_end(&mut received).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (mut conn, mut peer) = pair().await;
        assert_eq!(conn.write_bytes(b"bye").await.unwrap(), 3);
        conn.close().await;
        conn.close().await;
        assert!(conn.is_closed());

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bye");
        assert_eq!(conn.bytes_written(), 3);
    }

    #[test]
    fn disconnect_kinds_map_to_peer_closed() {
        let err = TransportError::from_io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(err, TransportError::PeerClosed));

        let err = TransportError::from_io(io::Error::from(io::ErrorKind::TimedOut));
        assert!(err.is_timeout());
    }
}
