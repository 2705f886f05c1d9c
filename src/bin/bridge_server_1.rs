//! Bridges each request to the destination over its own socket.

use std::process::ExitCode;

use bridge_servers::cli::{self, Preset};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run(Preset::Bridge).await
}
