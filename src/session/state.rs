//! Session state machine.

/// Phase of a bridge session.
///
/// ```text
/// Accepted → ParsingRequest → Forwarding → AwaitingUpstreamResponse → RelayingResponse → Closed
///     └──────────────┴──────────────┴────────────────┴──────────────────────┴──────▶ Errored
/// ```
///
/// `ParsingRequest` and `Forwarding` may also go straight to `Closed`: the
/// client can leave before sending a request, and locally answered requests
/// (404, 501) never reach an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Accepted,
    ParsingRequest,
    Forwarding,
    AwaitingUpstreamResponse,
    RelayingResponse,
    Closed,
    Errored,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Accepted => "accepted",
            SessionState::ParsingRequest => "parsing_request",
            SessionState::Forwarding => "forwarding",
            SessionState::AwaitingUpstreamResponse => "awaiting_upstream_response",
            SessionState::RelayingResponse => "relaying_response",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Errored {
            return true;
        }
        matches!(
            (self, next),
            (Accepted, ParsingRequest)
                | (ParsingRequest, Forwarding)
                | (ParsingRequest, Closed)
                | (Forwarding, AwaitingUpstreamResponse)
                | (Forwarding, Closed)
                | (AwaitingUpstreamResponse, RelayingResponse)
                | (RelayingResponse, Closed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
