//! Answers `GET /YYYY/MM/DD` after a random pause.

use std::process::ExitCode;

use bridge_servers::cli::{self, Preset};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run(Preset::DelayServer).await
}
