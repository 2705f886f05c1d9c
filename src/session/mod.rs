//! Bridge session subsystem.
//!
//! # Data Flow
//! ```text
//! inbound Connection
//!     → bridge.rs (ParsingRequest: http::MessageReader)
//!     → topology (Direct: transport::connect | Pipe: transport::spawn_relay | Synthetic)
//!     → bridge.rs (Forwarding, AwaitingUpstreamResponse)
//!     → delay::DelayInjector (RelayingResponse)
//!     → inbound Connection
//! ```
//!
//! # Design Decisions
//! - One session type for every topology; only the outbound path differs
//! - Phases run strictly in sequence inside one task
//! - Client disconnect is raced against the upstream and relay phases
//! - Locally produced error responses bypass the delay policy

pub mod bridge;
pub mod pause;
pub mod rewrite;
pub mod state;
pub mod synthetic;

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::delay::DelayPolicy;
use crate::http::{ParserLimits, ProtocolError, ReadError};
use crate::transport::{RelaySpec, TransportError};

pub use bridge::BridgeSession;
pub use pause::PauseRange;
pub use rewrite::Rewrite;
pub use state::SessionState;

/// Where requests go once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeTopology {
    /// Open a socket to `destination` (`host:port`).
    Direct { destination: String },
    /// Hand raw HTTP bytes to a relay process over its stdin/stdout.
    /// `destination` is the address the relay reaches.
    Pipe { relay: RelaySpec, destination: String },
    /// No upstream; answer date paths after a random pause.
    Synthetic { pause: PauseRange },
}

impl BridgeTopology {
    pub fn mode(&self) -> &'static str {
        match self {
            BridgeTopology::Direct { .. } => "direct",
            BridgeTopology::Pipe { .. } => "pipe",
            BridgeTopology::Synthetic { .. } => "synthetic",
        }
    }

    /// Address requests finally reach, if there is one.
    pub fn destination(&self) -> Option<&str> {
        match self {
            BridgeTopology::Direct { destination } | BridgeTopology::Pipe { destination, .. } => {
                Some(destination)
            }
            BridgeTopology::Synthetic { .. } => None,
        }
    }
}

impl std::fmt::Display for BridgeTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeTopology::Direct { destination } => write!(f, "direct to {}", destination),
            BridgeTopology::Pipe { relay, destination } => {
                write!(f, "pipe via {} to {}", relay.program.display(), destination)
            }
            BridgeTopology::Synthetic { pause } => {
                write!(f, "synthetic, pause {:?}..={:?}", pause.min(), pause.max())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    /// Opening the outbound socket.
    pub connect: Duration,
    /// Receiving and forwarding the client's request.
    pub request: Duration,
    /// Waiting for each piece of the upstream response.
    pub upstream: Duration,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            request: Duration::from_secs(30),
            upstream: Duration::from_secs(30),
        }
    }
}

/// Process-wide, read-only settings every session is created with.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub topology: BridgeTopology,
    pub delay: DelayPolicy,
    pub timeouts: PhaseTimeouts,
    pub limits: ParserLimits,
    pub rewrite: Rewrite,
    /// Largest upstream body collected for a data-query report.
    pub max_buffered_body: usize,
}

impl SessionContext {
    pub fn new(topology: BridgeTopology) -> Self {
        Self {
            topology,
            delay: DelayPolicy::None,
            timeouts: PhaseTimeouts::default(),
            limits: ParserLimits::default(),
            rewrite: Rewrite::None,
            max_buffered_body: 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] TransportError),

    #[error("upstream body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl SessionError {
    pub(crate) fn timed_out(phase: SessionState) -> Self {
        SessionError::Transport(TransportError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} timed out", phase),
        )))
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SessionError::Protocol(_) => "protocol_error",
            SessionError::Transport(err) if err.is_timeout() => "timeout",
            SessionError::Transport(TransportError::PeerClosed) => "peer_closed",
            SessionError::Transport(_) => "io_error",
            SessionError::UpstreamUnavailable(_) => "upstream_unavailable",
            SessionError::BodyTooLarge { .. } => "body_too_large",
        }
    }
}

impl From<ReadError> for SessionError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Protocol(err) => SessionError::Protocol(err),
            ReadError::Io(err) => SessionError::Transport(TransportError::from_io(err)),
            ReadError::BodyTooLarge { limit } => SessionError::BodyTooLarge { limit },
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A complete response reached the client.
    Completed,
    /// The response was cut off by the truncation policy.
    Truncated,
    /// The client left without sending a request.
    NoRequest,
    /// The session ended in `Errored`.
    Failed,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Truncated => "truncated",
            SessionOutcome::NoRequest => "no_request",
            SessionOutcome::Failed => "failed",
        }
    }
}

/// Summary handed back to the dispatcher when a session ends.
#[derive(Debug)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub final_state: SessionState,
    /// Status of the response sent to the client, if one was started.
    pub status: Option<http::StatusCode>,
    /// Bytes written to the client.
    pub bytes_to_client: u64,
    pub duration: Duration,
    pub error: Option<SessionError>,
}

impl SessionReport {
    /// Metric label: the outcome, or the error kind for failed sessions.
    pub fn label(&self) -> &'static str {
        match &self.error {
            Some(err) => err.label(),
            None => self.outcome.as_str(),
        }
    }
}
