//! Bridges each request through a `bridge_relay` child process.

use std::process::ExitCode;

use bridge_servers::cli::{self, Preset};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run(Preset::PipeBridge).await
}
