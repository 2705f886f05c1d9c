//! Framing errors.

use thiserror::Error;

/// Reason code attached to every [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Request or status line could not be parsed.
    InvalidStartLine,
    /// A start, header, chunk-size or trailer line exceeded the configured maximum.
    HeaderLineTooLong,
    TooManyHeaders,
    InvalidHeader,
    /// Both `Content-Length` and `Transfer-Encoding` were present.
    ConflictingFraming,
    InvalidContentLength,
    InvalidChunkSize,
    UnsupportedTransferEncoding,
}

impl ProtocolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolErrorKind::InvalidStartLine => "invalid_start_line",
            ProtocolErrorKind::HeaderLineTooLong => "header_line_too_long",
            ProtocolErrorKind::TooManyHeaders => "too_many_headers",
            ProtocolErrorKind::InvalidHeader => "invalid_header",
            ProtocolErrorKind::ConflictingFraming => "conflicting_framing",
            ProtocolErrorKind::InvalidContentLength => "invalid_content_length",
            ProtocolErrorKind::InvalidChunkSize => "invalid_chunk_size",
            ProtocolErrorKind::UnsupportedTransferEncoding => "unsupported_transfer_encoding",
        }
    }
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed HTTP on either side of a session.
#[derive(Debug, Clone, Error)]
#[error("protocol error ({kind}): {detail}")]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    detail: String,
}

impl ProtocolError {
    pub fn new(kind: ProtocolErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ProtocolErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}
