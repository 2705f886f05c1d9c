//! Incremental HTTP/1.x parser.
//!
//! The parser never touches I/O. Callers append bytes to a `BytesMut` and ask
//! it to make progress; it consumes complete lines from the front of the
//! buffer and leaves partial ones in place.
//!
//! ```text
//! AwaitingStartLine ──▶ ReadingHeaders ──▶ ReadingBody(kind) ──▶ Complete
//!         │                   │                   │                 │
//!         └───────────────────┴─────────┬─────────┘                 │
//!                                       ▼                           │
//!                                   Malformed        reset() ◀──────┘
//! ```

use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode};

use crate::http::error::{ProtocolError, ProtocolErrorKind};
use crate::http::headers::Headers;
use crate::http::message::{BodyKind, Frame, Request, RequestHead, Response, ResponseHead, Version};

/// Size limits applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Longest accepted start, header, chunk-size or trailer line, terminator excluded.
    pub max_line_bytes: usize,
    /// Most header (or trailer) fields in one message.
    pub max_headers: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 8 * 1024,
            max_headers: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    AwaitingStartLine,
    ReadingHeaders,
    ReadingBody(BodyKind),
    Complete,
    Malformed(ProtocolErrorKind),
}

/// Result of one body decoding step.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    /// More input is needed before progress can be made.
    NeedMore,
    /// The body is finished; the message is complete.
    Done,
}

/// Which side of the exchange a head belongs to.
enum Side<'a> {
    Request,
    Response { request_method: &'a Method },
}

/// Parser for one message at a time on a connection.
#[derive(Debug)]
pub struct MessageParser {
    limits: ParserLimits,
    state: ParseState,
    start_line: Option<String>,
    headers: Headers,
    /// Every line of the current head as received.
    raw_head: BytesMut,
    decoder: BodyDecoder,
}

impl MessageParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self {
            limits,
            state: ParseState::AwaitingStartLine,
            start_line: None,
            headers: Headers::new(),
            raw_head: BytesMut::new(),
            decoder: BodyDecoder::done(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Complete
    }

    /// Whether any part of a message has been consumed.
    pub fn in_progress(&self) -> bool {
        !matches!(self.state, ParseState::AwaitingStartLine)
    }

    /// Prepare for the next message on a persistent connection.
    ///
    /// Only valid once the previous message is complete; otherwise the state
    /// is left untouched and `false` is returned.
    pub fn reset(&mut self) -> bool {
        if self.state != ParseState::Complete {
            return false;
        }
        self.state = ParseState::AwaitingStartLine;
        self.start_line = None;
        self.headers = Headers::new();
        self.raw_head.clear();
        true
    }

    /// Advance through a request head. `Ok(None)` means more bytes are needed.
    pub fn parse_request(&mut self, buf: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
        let result = self.parse_head(buf, Side::Request);
        self.guard(result).map(|parsed| {
            parsed.map(|(head, body)| match head {
                Head::Request(head) => Request { head, body },
                Head::Response(_) => unreachable!("request side produced a response head"),
            })
        })
    }

    /// Advance through a response head to a request made with `request_method`.
    pub fn parse_response(
        &mut self,
        buf: &mut BytesMut,
        request_method: &Method,
    ) -> Result<Option<Response>, ProtocolError> {
        let result = self.parse_head(buf, Side::Response { request_method });
        self.guard(result).map(|parsed| {
            parsed.map(|(head, body)| match head {
                Head::Response(head) => Response { head, body },
                Head::Request(_) => unreachable!("response side produced a request head"),
            })
        })
    }

    /// Decode the next piece of body from `buf`.
    pub fn decode_body(&mut self, buf: &mut BytesMut) -> Result<Decoded, ProtocolError> {
        match self.state {
            ParseState::ReadingBody(_) => {}
            ParseState::Complete => return Ok(Decoded::Done),
            ParseState::Malformed(kind) => {
                return Err(ProtocolError::new(kind, "parser already failed"));
            }
            ParseState::AwaitingStartLine | ParseState::ReadingHeaders => {
                return Err(ProtocolError::new(
                    ProtocolErrorKind::InvalidStartLine,
                    "body requested before head was parsed",
                ));
            }
        }

        let result = self.decoder.decode(buf, &self.limits);
        let decoded = self.guard(result)?;
        if decoded == Decoded::Done {
            self.state = ParseState::Complete;
        }
        Ok(decoded)
    }

    /// The peer closed the stream. Returns whether that legitimately ends the body.
    pub fn finish_on_eof(&mut self) -> bool {
        if let ParseState::ReadingBody(BodyKind::CloseDelimited) = self.state {
            self.state = ParseState::Complete;
            return true;
        }
        self.state == ParseState::Complete
    }

    fn guard<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, ProtocolError> {
        if let Err(err) = &result {
            self.state = ParseState::Malformed(err.kind());
        }
        result
    }

    fn parse_head(
        &mut self,
        buf: &mut BytesMut,
        side: Side<'_>,
    ) -> Result<Option<(Head, BodyKind)>, ProtocolError> {
        loop {
            match self.state {
                ParseState::AwaitingStartLine => {
                    let Some(line) = take_line(buf, self.limits.max_line_bytes)? else {
                        return Ok(None);
                    };
                    self.raw_head.extend_from_slice(&line.raw);
                    let text = line.content();
                    // Stray empty lines before a start line are tolerated.
                    if text.is_empty() {
                        continue;
                    }
                    let text = std::str::from_utf8(text).map_err(|_| {
                        ProtocolError::new(ProtocolErrorKind::InvalidStartLine, "start line is not utf-8")
                    })?;
                    self.start_line = Some(text.to_string());
                    self.state = ParseState::ReadingHeaders;
                }
                ParseState::ReadingHeaders => {
                    let Some(line) = take_line(buf, self.limits.max_line_bytes)? else {
                        return Ok(None);
                    };
                    self.raw_head.extend_from_slice(&line.raw);
                    if line.content().is_empty() {
                        return self.finish_head(side).map(Some);
                    }
                    if self.headers.len() >= self.limits.max_headers {
                        return Err(ProtocolError::new(
                            ProtocolErrorKind::TooManyHeaders,
                            format!("more than {} fields", self.limits.max_headers),
                        ));
                    }
                    let (name, value) = parse_header_line(line.content())?;
                    self.headers.append(name, value);
                }
                ParseState::ReadingBody(_) | ParseState::Complete => {
                    return Err(ProtocolError::new(
                        ProtocolErrorKind::InvalidStartLine,
                        "previous message was not reset",
                    ));
                }
                ParseState::Malformed(kind) => {
                    return Err(ProtocolError::new(kind, "parser already failed"));
                }
            }
        }
    }

    fn finish_head(&mut self, side: Side<'_>) -> Result<(Head, BodyKind), ProtocolError> {
        let start_line = self.start_line.take().unwrap_or_default();
        let headers = std::mem::take(&mut self.headers);
        let raw = Some(self.raw_head.split().freeze());

        let (head, kind) = match side {
            Side::Request => {
                let (method, target, version) = parse_request_line(&start_line)?;
                let kind = request_body_kind(&headers)?;
                let head = RequestHead {
                    method,
                    target,
                    version,
                    headers,
                    raw,
                };
                (Head::Request(head), kind)
            }
            Side::Response { request_method } => {
                let (version, status, reason) = parse_status_line(&start_line)?;
                let kind = response_body_kind(&headers, status, request_method)?;
                let head = ResponseHead {
                    version,
                    status,
                    reason,
                    headers,
                    raw,
                };
                (Head::Response(head), kind)
            }
        };

        self.decoder = BodyDecoder::for_kind(kind);
        self.state = if kind.is_empty() {
            ParseState::Complete
        } else {
            ParseState::ReadingBody(kind)
        };
        Ok((head, kind))
    }
}

enum Head {
    Request(RequestHead),
    Response(ResponseHead),
}

/// A line taken from the front of the buffer, terminator included.
struct Line {
    raw: Bytes,
    content_len: usize,
}

impl Line {
    fn content(&self) -> &[u8] {
        &self.raw[..self.content_len]
    }
}

/// Take one LF-terminated line (optional CR) off the front of `buf`.
fn take_line(buf: &mut BytesMut, max_line_bytes: usize) -> Result<Option<Line>, ProtocolError> {
    // Room for the content plus CRLF.
    let window = buf.len().min(max_line_bytes + 2);
    match buf[..window].iter().position(|&b| b == b'\n') {
        Some(newline) => {
            let raw = buf.split_to(newline + 1).freeze();
            let mut content_len = newline;
            if content_len > 0 && raw[content_len - 1] == b'\r' {
                content_len -= 1;
            }
            if content_len > max_line_bytes {
                return Err(line_too_long(max_line_bytes));
            }
            Ok(Some(Line { raw, content_len }))
        }
        None if buf.len() > max_line_bytes + 1 => Err(line_too_long(max_line_bytes)),
        None => Ok(None),
    }
}

fn line_too_long(max_line_bytes: usize) -> ProtocolError {
    ProtocolError::new(
        ProtocolErrorKind::HeaderLineTooLong,
        format!("line exceeds {} bytes", max_line_bytes),
    )
}

fn parse_request_line(line: &str) -> Result<(Method, String, Version), ProtocolError> {
    let invalid = || ProtocolError::new(ProtocolErrorKind::InvalidStartLine, format!("{:?}", line));

    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let method = Method::from_bytes(method.as_bytes()).map_err(|_| invalid())?;
    if target.is_empty() || target.bytes().any(|b| b.is_ascii_control()) {
        return Err(invalid());
    }
    let version = Version::parse(version).ok_or_else(invalid)?;
    Ok((method, target.to_string(), version))
}

fn parse_status_line(line: &str) -> Result<(Version, StatusCode, String), ProtocolError> {
    let invalid = || ProtocolError::new(ProtocolErrorKind::InvalidStartLine, format!("{:?}", line));

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().and_then(Version::parse).ok_or_else(invalid)?;
    let code = parts.next().ok_or_else(invalid)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let status = StatusCode::from_bytes(code.as_bytes()).map_err(|_| invalid())?;
    let reason = parts.next().unwrap_or("").to_string();
    Ok((version, status, reason))
}

fn parse_header_line(line: &[u8]) -> Result<(String, Bytes), ProtocolError> {
    let invalid = |why: &str| ProtocolError::new(ProtocolErrorKind::InvalidHeader, why.to_string());

    if matches!(line.first(), Some(b' ' | b'\t')) {
        return Err(invalid("obsolete line folding"));
    }
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| invalid("missing colon"))?;
    let name = &line[..colon];
    if name.is_empty() || !name.iter().all(|&b| is_token_byte(b)) {
        return Err(invalid("invalid field name"));
    }
    let value = trim_ows(&line[colon + 1..]);
    if value.iter().any(|&b| b == 0 || b == b'\r' || b == b'\n') {
        return Err(invalid("invalid field value"));
    }

    // Token bytes are ASCII, so this cannot fail.
    let name = String::from_utf8_lossy(name).into_owned();
    Ok((name, Bytes::copy_from_slice(value)))
}

fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn request_body_kind(headers: &Headers) -> Result<BodyKind, ProtocolError> {
    let codings = headers.transfer_codings();
    if !codings.is_empty() {
        if headers.contains("content-length") {
            return Err(conflicting());
        }
        return match codings.last().map(String::as_str) {
            Some("chunked") => Ok(BodyKind::Chunked),
            _ => Err(ProtocolError::new(
                ProtocolErrorKind::UnsupportedTransferEncoding,
                codings.join(", "),
            )),
        };
    }
    Ok(match headers.content_length()? {
        Some(length) => BodyKind::Length(length),
        None => BodyKind::Empty,
    })
}

fn response_body_kind(
    headers: &Headers,
    status: StatusCode,
    request_method: &Method,
) -> Result<BodyKind, ProtocolError> {
    if *request_method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(BodyKind::Empty);
    }

    let codings = headers.transfer_codings();
    if !codings.is_empty() {
        if headers.contains("content-length") {
            return Err(conflicting());
        }
        return Ok(match codings.last().map(String::as_str) {
            Some("chunked") => BodyKind::Chunked,
            _ => BodyKind::CloseDelimited,
        });
    }
    Ok(match headers.content_length()? {
        Some(length) => BodyKind::Length(length),
        None => BodyKind::CloseDelimited,
    })
}

fn conflicting() -> ProtocolError {
    ProtocolError::new(
        ProtocolErrorKind::ConflictingFraming,
        "both Content-Length and Transfer-Encoding present",
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data { remaining: u64 },
    DataEnd,
    Trailers { seen: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyDecoder {
    Length { remaining: u64 },
    Chunked(ChunkState),
    Close,
    Done,
}

impl BodyDecoder {
    fn done() -> Self {
        BodyDecoder::Done
    }

    fn for_kind(kind: BodyKind) -> Self {
        match kind {
            BodyKind::Empty | BodyKind::Length(0) => BodyDecoder::Done,
            BodyKind::Length(remaining) => BodyDecoder::Length { remaining },
            BodyKind::Chunked => BodyDecoder::Chunked(ChunkState::Size),
            BodyKind::CloseDelimited => BodyDecoder::Close,
        }
    }

    fn decode(&mut self, buf: &mut BytesMut, limits: &ParserLimits) -> Result<Decoded, ProtocolError> {
        match *self {
            BodyDecoder::Done => Ok(Decoded::Done),
            BodyDecoder::Close => {
                if buf.is_empty() {
                    return Ok(Decoded::NeedMore);
                }
                let len = buf.len();
                Ok(Decoded::Frame(Frame::Data(buf.split_to(len).freeze())))
            }
            BodyDecoder::Length { remaining } => {
                if buf.is_empty() {
                    return Ok(Decoded::NeedMore);
                }
                let (data, left) = take_data(buf, remaining);
                *self = if left == 0 {
                    BodyDecoder::Done
                } else {
                    BodyDecoder::Length { remaining: left }
                };
                Ok(Decoded::Frame(Frame::Data(data)))
            }
            BodyDecoder::Chunked(state) => self.decode_chunked(state, buf, limits),
        }
    }

    fn decode_chunked(
        &mut self,
        state: ChunkState,
        buf: &mut BytesMut,
        limits: &ParserLimits,
    ) -> Result<Decoded, ProtocolError> {
        match state {
            ChunkState::Size => {
                let Some(line) = take_line(buf, limits.max_line_bytes)? else {
                    return Ok(Decoded::NeedMore);
                };
                let size = parse_chunk_size(line.content())?;
                *self = if size == 0 {
                    BodyDecoder::Chunked(ChunkState::Trailers { seen: 0 })
                } else {
                    BodyDecoder::Chunked(ChunkState::Data { remaining: size })
                };
                Ok(Decoded::Frame(Frame::Framing(line.raw)))
            }
            ChunkState::Data { remaining } => {
                if buf.is_empty() {
                    return Ok(Decoded::NeedMore);
                }
                let (data, left) = take_data(buf, remaining);
                *self = if left == 0 {
                    BodyDecoder::Chunked(ChunkState::DataEnd)
                } else {
                    BodyDecoder::Chunked(ChunkState::Data { remaining: left })
                };
                Ok(Decoded::Frame(Frame::Data(data)))
            }
            ChunkState::DataEnd => {
                let Some(line) = take_line(buf, limits.max_line_bytes)? else {
                    return Ok(Decoded::NeedMore);
                };
                if !line.content().is_empty() {
                    return Err(ProtocolError::new(
                        ProtocolErrorKind::InvalidChunkSize,
                        "chunk data longer than declared size",
                    ));
                }
                *self = BodyDecoder::Chunked(ChunkState::Size);
                Ok(Decoded::Frame(Frame::Framing(line.raw)))
            }
            ChunkState::Trailers { seen } => {
                let Some(line) = take_line(buf, limits.max_line_bytes)? else {
                    return Ok(Decoded::NeedMore);
                };
                if line.content().is_empty() {
                    *self = BodyDecoder::Done;
                } else {
                    if seen >= limits.max_headers {
                        return Err(ProtocolError::new(
                            ProtocolErrorKind::TooManyHeaders,
                            "too many trailer fields",
                        ));
                    }
                    parse_header_line(line.content())?;
                    *self = BodyDecoder::Chunked(ChunkState::Trailers { seen: seen + 1 });
                }
                Ok(Decoded::Frame(Frame::Framing(line.raw)))
            }
        }
    }
}

fn take_data(buf: &mut BytesMut, remaining: u64) -> (Bytes, u64) {
    let available = buf.len() as u64;
    let take = remaining.min(available) as usize;
    (buf.split_to(take).freeze(), remaining - take as u64)
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ProtocolError> {
    let invalid = || {
        ProtocolError::new(
            ProtocolErrorKind::InvalidChunkSize,
            format!("{:?}", String::from_utf8_lossy(line)),
        )
    };

    let end = line.iter().position(|&b| b == b';').unwrap_or(line.len());
    let digits = trim_ows(&line[..end]);
    if digits.is_empty() || digits.len() > 16 {
        return Err(invalid());
    }
    digits.iter().try_fold(0u64, |size, &b| {
        let digit = (b as char).to_digit(16).ok_or_else(invalid)?;
        size.checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(invalid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> MessageParser {
        MessageParser::new(ParserLimits::default())
    }

    fn drain_body(parser: &mut MessageParser, buf: &mut BytesMut) -> (Vec<u8>, Vec<u8>) {
        let mut wire = Vec::new();
        let mut data = Vec::new();
        loop {
            match parser.decode_body(buf).unwrap() {
                Decoded::Frame(frame) => {
                    if let Some(bytes) = frame.data() {
                        data.extend_from_slice(bytes);
                    }
                    wire.extend_from_slice(frame.wire());
                }
                Decoded::NeedMore | Decoded::Done => return (wire, data),
            }
        }
    }

    #[test]
    fn parses_request_delivered_byte_by_byte() {
        let raw = b"POST /upload?x=1 HTTP/1.1\r\nHost: a\r\nContent-Length: 3\r\n\r\nabc";
        let mut parser = parser();
        let mut buf = BytesMut::new();
        let mut request = None;

        for &byte in raw.iter() {
            buf.extend_from_slice(&[byte]);
            if request.is_none() {
                request = parser.parse_request(&mut buf).unwrap();
            }
        }

        let request = request.expect("head parsed");
        assert_eq!(request.head.method, Method::POST);
        assert_eq!(request.head.target, "/upload?x=1");
        assert_eq!(request.body, BodyKind::Length(3));
        assert_eq!(parser.state(), ParseState::ReadingBody(BodyKind::Length(3)));

        let (_, data) = drain_body(&mut parser, &mut buf);
        assert_eq!(data, b"abc");
        assert!(parser.is_complete());
    }

    #[test]
    fn states_advance_as_lines_arrive() {
        let mut parser = parser();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert!(parser.parse_request(&mut buf).unwrap().is_none());
        assert_eq!(parser.state(), ParseState::ReadingHeaders);

        buf.extend_from_slice(b"Host: x\r\n\r\n");
        let request = parser.parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(request.body, BodyKind::Empty);
        assert_eq!(parser.state(), ParseState::Complete);

        assert!(parser.reset());
        assert_eq!(parser.state(), ParseState::AwaitingStartLine);
    }

    #[test]
    fn chunked_body_keeps_wire_bytes() {
        let body = b"4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Trailer: y\r\n\r\n";
        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        buf.extend_from_slice(body);

        let mut parser = parser();
        let request = parser.parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(request.body, BodyKind::Chunked);

        let (wire, data) = drain_body(&mut parser, &mut buf);
        assert_eq!(wire, body);
        assert_eq!(data, b"Wikipedia");
        assert!(parser.is_complete());
    }

    #[test]
    fn bad_chunk_size_is_malformed() {
        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n"[..]);
        let mut parser = parser();
        parser.parse_request(&mut buf).unwrap().unwrap();

        let err = parser.decode_body(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ProtocolErrorKind::InvalidChunkSize);
        assert_eq!(parser.state(), ParseState::Malformed(ProtocolErrorKind::InvalidChunkSize));
    }

    #[test]
    fn chunk_size_overflow_is_rejected() {
        assert!(parse_chunk_size(b"ffffffffffffffffff").is_err());
        assert_eq!(parse_chunk_size(b"1A ; name=value").unwrap(), 26);
    }

    #[test]
    fn conflicting_framing_is_rejected() {
        let mut buf = BytesMut::from(
            &b"POST / HTTP/1.1\r\nContent-Length: 4\r\nTransfer-Encoding: chunked\r\n\r\n"[..],
        );
        let err = parser().parse_request(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ProtocolErrorKind::ConflictingFraming);
    }

    #[test]
    fn overlong_header_line_is_rejected_before_newline() {
        let limits = ParserLimits {
            max_line_bytes: 64,
            max_headers: 10,
        };
        let mut parser = MessageParser::new(limits);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Long: "[..]);
        buf.extend_from_slice(&[b'a'; 80]);

        let err = parser.parse_request(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ProtocolErrorKind::HeaderLineTooLong);
    }

    #[test]
    fn too_many_headers() {
        let limits = ParserLimits {
            max_line_bytes: 64,
            max_headers: 2,
        };
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n"[..]);
        let err = MessageParser::new(limits).parse_request(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ProtocolErrorKind::TooManyHeaders);
    }

    #[test]
    fn invalid_start_lines() {
        for line in [
            &b"GET /\r\n\r\n"[..],
            b"GET / HTTP/2.0\r\n\r\n",
            b"GET  / HTTP/1.1\r\n\r\n",
            b"G(T / HTTP/1.1\r\n\r\n",
        ] {
            let mut buf = BytesMut::from(line);
            let err = parser().parse_request(&mut buf).unwrap_err();
            assert_eq!(err.kind(), ProtocolErrorKind::InvalidStartLine, "{:?}", line);
        }
    }

    #[test]
    fn folded_header_is_rejected() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nA: 1\r\n  continued\r\n\r\n"[..]);
        let err = parser().parse_request(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ProtocolErrorKind::InvalidHeader);
    }

    #[test]
    fn header_values_are_trimmed_and_names_keep_case() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Mixed-Case:   spaced value \t\r\n\r\n"[..]);
        let request = parser().parse_request(&mut buf).unwrap().unwrap();
        let field = request.head.headers.iter().next().unwrap();
        assert_eq!(field.name(), "X-Mixed-Case");
        assert_eq!(field.value(), b"spaced value");
    }

    #[test]
    fn response_framing_rules() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n"[..]);
        let response = parser().parse_response(&mut buf, &Method::HEAD).unwrap().unwrap();
        assert_eq!(response.body, BodyKind::Empty);

        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nuntil close"[..]);
        let mut parser = parser();
        let response = parser.parse_response(&mut buf, &Method::GET).unwrap().unwrap();
        assert_eq!(response.body, BodyKind::CloseDelimited);
        let (_, data) = drain_body(&mut parser, &mut buf);
        assert_eq!(data, b"until close");
        assert!(!parser.is_complete());
        assert!(parser.finish_on_eof());
    }

    #[test]
    fn status_line_keeps_custom_reason() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 299 Quite Fine\r\n\r\n"[..]);
        let response = parser().parse_response(&mut buf, &Method::GET).unwrap().unwrap();
        assert_eq!(response.head.status.as_u16(), 299);
        assert_eq!(response.head.reason, "Quite Fine");

        let mut buf = BytesMut::from(&b"HTTP/1.1 204\r\n\r\n"[..]);
        let response = parser().parse_response(&mut buf, &Method::GET).unwrap().unwrap();
        assert_eq!(response.head.reason, "");
        assert_eq!(response.body, BodyKind::Empty);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let mut buf = BytesMut::from(&b"\r\n\r\nGET / HTTP/1.1\r\n\r\n"[..]);
        let request = parser().parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(request.head.target, "/");
        assert_eq!(request.head.raw.as_deref(), Some(&b"\r\n\r\nGET / HTTP/1.1\r\n\r\n"[..]));
    }

    #[test]
    fn raw_head_keeps_irregular_spelling() {
        let raw = b"HTTP/1.1 200\nContent-Length:2\nX-Pad:   a  \r\n\n";
        let mut buf = BytesMut::from(&raw[..]);
        buf.extend_from_slice(b"ok");
        let mut parser = parser();
        let response = parser.parse_response(&mut buf, &Method::GET).unwrap().unwrap();

        assert_eq!(response.head.raw.as_deref(), Some(&raw[..]));
        assert_eq!(response.head.headers.get_str("x-pad"), Some("a"));
        assert_eq!(&buf[..], b"ok");

        let (_, data) = drain_body(&mut parser, &mut buf);
        assert_eq!(data, b"ok");
        assert!(parser.reset());
        let mut next = BytesMut::from(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]);
        let response = parser.parse_response(&mut next, &Method::GET).unwrap().unwrap();
        assert_eq!(response.head.raw.as_deref(), Some(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]));
    }
}
