//! OS signal handling.
//!
//! SIGINT and SIGTERM both trigger a graceful shutdown; a second one while
//! draining is left to the drain timeout.

use crate::lifecycle::Shutdown;

/// Resolves when the process is asked to stop.
pub async fn stop_requested() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = term.recv() => "SIGTERM",
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Cannot listen for SIGTERM, only SIGINT will stop the server");
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}

/// Trigger `shutdown` on the first stop signal.
pub fn spawn_signal_handler(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let signal = stop_requested().await;
        tracing::info!(signal, "Shutdown requested");
        shutdown.trigger();
    })
}
