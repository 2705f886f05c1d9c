//! Same bridge as `bridge_server_1`, with every session multiplexed on a
//! single thread.

use std::process::ExitCode;

use bridge_servers::cli::{self, Preset};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    cli::run(Preset::Bridge).await
}
