//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use std::sync::Arc;

use bridge_servers::net::SessionTracker;
use bridge_servers::session::{BridgeSession, SessionReport};
use bridge_servers::transport::{Connection, Direction};
use bridge_servers::{DrainReport, Server, ServerSettings, SessionContext, Shutdown};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A running server under test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub tracker: SessionTracker,
    pub handle: JoinHandle<DrainReport>,
}

impl TestServer {
    pub async fn stop(self) -> DrainReport {
        self.shutdown.trigger();
        self.handle.await.unwrap()
    }

    /// Wait until no session is running, or fail after `limit`.
    pub async fn wait_idle(&self, limit: Duration) {
        tokio::time::timeout(limit, async {
            while self.tracker.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("sessions still running");
    }
}

/// Bind a server on an ephemeral port and run it in the background.
pub async fn start_server(ctx: SessionContext, max_sessions: Option<usize>, drain: Duration) -> TestServer {
    let settings = ServerSettings {
        bind_address: "127.0.0.1:0".to_string(),
        max_sessions,
        drain_timeout: drain,
    };
    let server = Server::bind(&settings, ctx).await.unwrap();
    let addr = server.local_addr();
    let tracker = server.tracker();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(shutdown.subscribe()));
    TestServer {
        addr,
        shutdown,
        tracker,
        handle,
    }
}

/// Backend that reads one request head, reports it on the channel, then
/// writes `response` piece by piece with `gap` between pieces and closes.
pub async fn start_raw_backend(
    pieces: &[&'static str],
    gap: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (heads, received) = mpsc::unbounded_channel();
    let pieces = pieces.to_vec();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let pieces = pieces.clone();
            let heads = heads.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = heads.send(head);
                for (i, piece) in pieces.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(gap).await;
                    }
                    if socket.write_all(piece.as_bytes()).await.is_err() {
                        return;
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, received)
}

/// Backend that accepts and reads but never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut sink = [0u8; 1024];
                while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
            });
        }
    });
    addr
}

/// hyper server answering every request with `<method> <uri>`.
pub async fn start_hyper_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(|req: hyper::Request<Incoming>| async move {
                    let body = format!("{} {}", req.method(), req.uri());
                    Ok::<_, Infallible>(hyper::Response::new(Full::new(Bytes::from(body))))
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

/// Address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Send `request` and read until the server closes.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request).await.unwrap();
    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    response
}

/// Run one session outside any server: send `request`, read until close, and
/// return what the client received with the session's report.
pub async fn run_session(ctx: SessionContext, request: &[u8]) -> (Vec<u8>, SessionReport) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
    let (stream, peer) = listener.accept().await.unwrap();
    let session = BridgeSession::new(Connection::tcp(stream, Direction::Inbound), peer, Arc::new(ctx));
    let handle = tokio::spawn(session.run());

    client.write_all(request).await.unwrap();
    let mut received = Vec::new();
    client.read_to_end(&mut received).await.unwrap();
    (received, handle.await.unwrap())
}

/// Split a raw response at the end of its head.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .unwrap_or(raw.len());
    (String::from_utf8_lossy(&raw[..end]).into_owned(), raw[end..].to_vec())
}

/// Read one request head byte by byte, blank line included.
pub async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
