//! HTTP/1.x framing subsystem.
//!
//! # Data Flow
//! ```text
//! bytes from a Connection
//!     → parser.rs (incremental state machine, no I/O)
//!     → reader.rs (fills the buffer, yields heads and body frames)
//!     → message.rs (Request / Response heads, BodyKind, Frame)
//!     → writer.rs (heads back to bytes, framing for local messages)
//!     → bytes to a Connection
//! ```
//!
//! # Design Decisions
//! - Bodies are never buffered whole; they stream as wire-exact frames
//! - Header order and spelling survive a parse/serialize round trip
//! - Nothing here knows about delay policy or bridging topology

pub mod error;
pub mod headers;
pub mod message;
pub mod parser;
pub mod reader;
pub mod writer;

pub use error::{ProtocolError, ProtocolErrorKind};
pub use headers::{HeaderField, Headers};
pub use message::{BodyKind, Frame, Request, RequestHead, Response, ResponseHead, Version};
pub use parser::{MessageParser, ParseState, ParserLimits};
pub use reader::{Body, MessageReader, ReadError};
