//! Message heads and body framing.

use bytes::Bytes;
use http::{Method, StatusCode};

use crate::http::headers::Headers;

/// HTTP/1.x minor version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    pub(crate) fn parse(text: &str) -> Option<Self> {
        match text {
            "HTTP/1.1" => Some(Version::Http11),
            "HTTP/1.0" => Some(Version::Http10),
            _ => None,
        }
    }
}

/// How the end of a body is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// No body at all.
    Empty,
    /// Exactly this many bytes follow the head.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Body runs until the peer closes (responses only).
    CloseDelimited,
}

impl BodyKind {
    pub fn is_empty(&self) -> bool {
        matches!(self, BodyKind::Empty | BodyKind::Length(0))
    }
}

/// Parsed request line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: Headers,
    /// Head bytes exactly as received, terminating blank line included.
    /// `None` for heads built in process. Clear it after editing a parsed head.
    pub raw: Option<Bytes>,
}

impl RequestHead {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            version: Version::Http11,
            headers: Headers::new(),
            raw: None,
        }
    }

    /// Path component of the request target.
    pub fn path(&self) -> &str {
        let target = self.target.as_str();
        let end = target.find('?').unwrap_or(target.len());
        &target[..end]
    }

    /// Query component of the request target, without the `?`.
    pub fn query(&self) -> &str {
        match self.target.find('?') {
            Some(start) => &self.target[start + 1..],
            None => "",
        }
    }

    /// Whether the client intends to keep the connection open.
    pub fn keep_alive(&self) -> bool {
        keep_alive(self.version, &self.headers)
    }
}

/// Parsed status line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub version: Version,
    pub status: StatusCode,
    /// Reason phrase exactly as received, so relayed status lines are unchanged.
    pub reason: String,
    pub headers: Headers,
    /// Head bytes exactly as received; see [`RequestHead::raw`].
    pub raw: Option<Bytes>,
}

impl ResponseHead {
    /// A response with the canonical reason phrase for `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: Version::Http11,
            status,
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers: Headers::new(),
            raw: None,
        }
    }

    pub fn keep_alive(&self) -> bool {
        keep_alive(self.version, &self.headers)
    }

    /// Interim (1xx) responses are followed by the final one. 101 is final.
    pub fn is_interim(&self) -> bool {
        self.status.is_informational() && self.status != StatusCode::SWITCHING_PROTOCOLS
    }
}

/// A request whose body is still on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub head: RequestHead,
    pub body: BodyKind,
}

/// A response whose body is still on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub head: ResponseHead,
    pub body: BodyKind,
}

/// One step of body decoding.
///
/// Frames carry the bytes exactly as they were on the wire. `Data` is payload;
/// `Framing` is chunk-size lines, chunk terminators and trailers, which only
/// exist in chunked bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(Bytes),
    Framing(Bytes),
}

impl Frame {
    pub fn wire(&self) -> &Bytes {
        match self {
            Frame::Data(bytes) | Frame::Framing(bytes) => bytes,
        }
    }

    pub fn into_wire(self) -> Bytes {
        match self {
            Frame::Data(bytes) | Frame::Framing(bytes) => bytes,
        }
    }

    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Frame::Data(bytes) => Some(bytes),
            Frame::Framing(_) => None,
        }
    }
}

fn keep_alive(version: Version, headers: &Headers) -> bool {
    match version {
        Version::Http11 => !headers.has_token("connection", "close"),
        Version::Http10 => headers.has_token("connection", "keep-alive"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_and_query_split() {
        let head = RequestHead::new(Method::GET, "/data?year=2024&month=01");
        assert_eq!(head.path(), "/data");
        assert_eq!(head.query(), "year=2024&month=01");

        let bare = RequestHead::new(Method::GET, "/plain");
        assert_eq!(bare.path(), "/plain");
        assert_eq!(bare.query(), "");
    }

    #[test]
    fn keep_alive_defaults_by_version() {
        let mut head = RequestHead::new(Method::GET, "/");
        assert!(head.keep_alive());
        head.headers.append("Connection", "close");
        assert!(!head.keep_alive());

        let mut old = RequestHead::new(Method::GET, "/");
        old.version = Version::Http10;
        assert!(!old.keep_alive());
        old.headers.append("Connection", "Keep-Alive");
        assert!(old.keep_alive());
    }
}
