//! Listener/dispatcher: accepts connections and runs one session task each.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → SessionTracker::try_admit (over limit: drop the connection)
//!     → JoinSet task: BridgeSession::run
//!     → SessionReport → metrics
//!
//! shutdown signal
//!     → stop accepting (listener dropped)
//!     → wait for in-flight sessions, bounded by the drain timeout
//!     → abort whatever is left
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::net::{Listener, ListenerError, SessionTracker};
use crate::observability::metrics;
use crate::session::{BridgeSession, SessionContext, SessionReport};
use crate::transport::Connection;

/// Pause after a failed accept, so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Listener-side settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_address: String,
    /// `None` means unlimited.
    pub max_sessions: Option<usize>,
    pub drain_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "localhost:8080".to_string(),
            max_sessions: None,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// What happened to sessions still running when shutdown began.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Finished on their own within the drain timeout.
    pub completed: usize,
    /// Aborted when the drain timeout expired.
    pub forced: usize,
}

pub struct Server {
    listener: Listener,
    tracker: SessionTracker,
    ctx: Arc<SessionContext>,
    drain_timeout: Duration,
}

impl Server {
    pub async fn bind(settings: &ServerSettings, ctx: SessionContext) -> Result<Self, ListenerError> {
        let listener = Listener::bind(&settings.bind_address).await?;
        tracing::info!(
            address = %listener.local_addr(),
            topology = %ctx.topology,
            delay = %ctx.delay,
            rewrite = ?ctx.rewrite,
            max_sessions = ?settings.max_sessions,
            "Server ready"
        );
        Ok(Self {
            listener,
            tracker: SessionTracker::new(settings.max_sessions),
            ctx: Arc::new(ctx),
            drain_timeout: settings.drain_timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Handle to the live-session count.
    pub fn tracker(&self) -> SessionTracker {
        self.tracker.clone()
    }

    /// Accept until `shutdown` fires, then drain.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> DrainReport {
        let Server {
            listener,
            tracker,
            ctx,
            drain_timeout,
        } = self;
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((conn, peer)) => dispatch(&mut sessions, &tracker, &ctx, conn, peer),
                    Err(err) => {
                        tracing::warn!(error = %err, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "Session task failed");
                    }
                }
            }
        }

        tracing::info!(address = %listener.local_addr(), "Stopped accepting");
        drop(listener);
        drain(sessions, drain_timeout).await
    }
}

fn dispatch(
    sessions: &mut JoinSet<SessionReport>,
    tracker: &SessionTracker,
    ctx: &Arc<SessionContext>,
    conn: Connection,
    peer: SocketAddr,
) {
    let Some(guard) = tracker.try_admit(conn.id()) else {
        tracing::debug!(
            peer_addr = %peer,
            active = tracker.active_count(),
            "Session limit reached, resetting connection"
        );
        metrics::record_admission_rejected();
        conn.abort();
        return;
    };
    metrics::set_active_sessions(tracker.active_count());

    let session = BridgeSession::new(conn, peer, Arc::clone(ctx));
    let tracker = tracker.clone();
    sessions.spawn(async move {
        let report = session.run().await;
        drop(guard);
        metrics::record_session(&report);
        metrics::set_active_sessions(tracker.active_count());
        report
    });
}

async fn drain(mut sessions: JoinSet<SessionReport>, timeout: Duration) -> DrainReport {
    let mut report = DrainReport::default();
    tracing::info!(in_flight = sessions.len(), timeout_ms = timeout.as_millis() as u64, "Draining sessions");

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            joined = sessions.join_next() => match joined {
                Some(_) => report.completed += 1,
                None => break,
            },
            _ = &mut deadline => {
                report.forced = sessions.len();
                sessions.abort_all();
                while sessions.join_next().await.is_some() {}
                break;
            }
        }
    }

    tracing::info!(completed = report.completed, forced = report.forced, "Drain finished");
    report
}
