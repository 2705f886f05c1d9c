//! Live-session accounting and admission control.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::transport::ConnectionId;

/// Counts live sessions and enforces the optional concurrency limit.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    active: Arc<AtomicUsize>,
    /// `None` means unlimited.
    max_sessions: Option<usize>,
}

impl SessionTracker {
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max_sessions,
        }
    }

    /// Reserve a slot for a new session, or `None` if the limit is reached.
    ///
    /// The check and the increment are one atomic step, so concurrent
    /// callers can never push the count past the limit.
    pub fn try_admit(&self, id: ConnectionId) -> Option<SessionGuard> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if let Some(max) = self.max_sessions {
                if current >= max {
                    return None;
                }
            }
            match self
                .active
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        Some(SessionGuard {
            active: Arc::clone(&self.active),
            id,
        })
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.max_sessions
    }
}

/// A held session slot. Released on drop, including when the session task
/// is aborted.
#[derive(Debug)]
pub struct SessionGuard {
    active: Arc<AtomicUsize>,
    id: ConnectionId,
}

impl SessionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(session_id = %self.id, active = previous - 1, "Session slot released");
    }
}
