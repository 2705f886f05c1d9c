//! Delay and fault injection.
//!
//! # Data Flow
//! ```text
//! session (response head + body wire bytes)
//!     → injector.rs (hold / split / cut per DelayPolicy)
//!     → client write half
//! ```
//!
//! # Design Decisions
//! - The policy is a plain value, chosen once per process
//! - Bytes are never reordered or rewritten, only timed or dropped
//! - Chunk sizes and cutoffs count body bytes as they appear on the wire

pub mod injector;
pub mod policy;

pub use injector::{DelayInjector, InjectorStats, Release};
pub use policy::{DelayPolicy, DelayStrategy};
