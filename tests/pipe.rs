//! Pipe topology through the real `bridge_relay` binary.

use std::time::Duration;

use bridge_servers::session::{PauseRange, SessionOutcome};
use bridge_servers::transport::RelaySpec;
use bridge_servers::{BridgeTopology, SessionContext};

mod common;

fn through_relay(destination: std::net::SocketAddr) -> SessionContext {
    let relay = RelaySpec::new(env!("CARGO_BIN_EXE_bridge_relay"))
        .arg("--target")
        .arg(destination.to_string());
    SessionContext::new(BridgeTopology::Pipe {
        relay,
        destination: destination.to_string(),
    })
}

#[tokio::test]
async fn request_crosses_relay_to_delay_server() {
    let delay_server = common::start_server(
        SessionContext::new(BridgeTopology::Synthetic {
            pause: PauseRange::new(1, 10).unwrap(),
        }),
        None,
        Duration::from_secs(1),
    )
    .await;
    let bridge = common::start_server(through_relay(delay_server.addr), None, Duration::from_secs(1)).await;

    let received = common::exchange(bridge.addr, b"GET /2023/12/31 HTTP/1.1\r\nHost: fixture\r\n\r\n").await;
    let (head, body) = common::split_response(&received);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(String::from_utf8(body).unwrap().starts_with("Hello world!\nPause: "));

    bridge.stop().await;
    delay_server.stop().await;
}

#[tokio::test]
async fn relay_without_destination_yields_bad_gateway() {
    let bridge = common::start_server(through_relay(common::closed_port().await), None, Duration::from_secs(1)).await;

    let received = common::exchange(bridge.addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(received.starts_with(b"HTTP/1.1 502 Bad Gateway\r\n"));
    bridge.stop().await;
}

#[tokio::test]
async fn missing_relay_program_yields_bad_gateway() {
    let ctx = SessionContext::new(BridgeTopology::Pipe {
        relay: RelaySpec::new("/nonexistent/bridge_relay"),
        destination: "localhost:1".to_string(),
    });
    let bridge = common::start_server(ctx, None, Duration::from_secs(1)).await;

    let received = common::exchange(bridge.addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(received.starts_with(b"HTTP/1.1 502 Bad Gateway\r\n"));
    bridge.stop().await;
}

#[tokio::test]
async fn pipe_and_direct_deliver_identical_bytes() {
    let response = [
        "HTTP/1.1 203 Borrowed Bytes\r\nX-Origin:raw\r\nTransfer-Encoding: chunked\r\n\r\n",
        "4\r\nwire\r\n",
        "5\r\n-safe\r\n0\r\n\r\n",
    ];
    let (backend, mut heads) = common::start_raw_backend(&response, Duration::from_millis(10)).await;
    let request = b"GET /same HTTP/1.1\r\nHost: fixture\r\n\r\n";

    let direct = SessionContext::new(BridgeTopology::Direct {
        destination: backend.to_string(),
    });
    let (direct_bytes, direct_report) = common::run_session(direct, request).await;
    let (pipe_bytes, pipe_report) = common::run_session(through_relay(backend), request).await;

    assert_eq!(direct_bytes, response.concat().as_bytes());
    assert_eq!(pipe_bytes, direct_bytes);
    assert_eq!(direct_report.outcome, SessionOutcome::Completed);
    assert_eq!(pipe_report.outcome, direct_report.outcome);
    assert_eq!(pipe_report.status, direct_report.status);
    assert_eq!(pipe_report.final_state, direct_report.final_state);
    assert!(direct_report.error.is_none());
    assert!(pipe_report.error.is_none());

    assert_eq!(heads.recv().await.unwrap().as_bytes(), request);
    assert_eq!(heads.recv().await.unwrap().as_bytes(), request);
}
