//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, wrap as transport::Connection)
//!     → tracker.rs (admission: reserve a session slot or drop)
//!     → Hand off to a bridge session
//! ```
//!
//! # Design Decisions
//! - Over-limit connections are dropped, not queued
//! - Slots are RAII guards, so aborted sessions still release them

pub mod listener;
pub mod tracker;

pub use listener::{Listener, ListenerError};
pub use tracker::{SessionGuard, SessionTracker};
