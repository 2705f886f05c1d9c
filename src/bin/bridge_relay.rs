//! Relay peer for `bridge_server_1_pipe`: stdin → destination → stdout.

use std::time::Duration;

use clap::Parser;

use bridge_servers::observability::logging::{init_logging, LogTarget};
use bridge_servers::relay::relay;

#[derive(Debug, Parser)]
#[command(version, about = "Copy stdin/stdout to and from a TCP destination")]
struct Args {
    /// Destination as host:port
    #[arg(long)]
    target: String,

    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Trace relay activity on stderr
    #[arg(short = 't', long)]
    tracing: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    // stdout carries the relayed bytes.
    init_logging("warn", args.tracing, LogTarget::Stderr);

    let result = relay(
        tokio::io::stdin(),
        tokio::io::stdout(),
        &args.target,
        Duration::from_millis(args.connect_timeout_ms),
    )
    .await;

    // Exit directly: a pending stdin read would otherwise hold the runtime open.
    let code = match result {
        Ok(stats) => {
            tracing::debug!(sent = stats.sent, received = stats.received, "Relay finished");
            0
        }
        Err(err) => {
            tracing::warn!(destination = %args.target, error = %err, "Relay failed");
            1
        }
    };
    std::process::exit(code);
}
