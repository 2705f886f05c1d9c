//! Message serialization.
//!
//! Parsed heads are written back from the bytes they were parsed from, so
//! spacing, line endings and an empty reason phrase survive relaying. Heads
//! built in process are serialized field by field, and only those get framing
//! headers computed, via [`apply_framing`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::http::headers::Headers;
use crate::http::message::{BodyKind, RequestHead, ResponseHead};

/// Terminating chunk of a chunked body with no trailers.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

pub fn encode_request_head(head: &RequestHead) -> Bytes {
    if let Some(raw) = &head.raw {
        return raw.clone();
    }
    let mut out = BytesMut::with_capacity(estimate(&head.headers) + head.target.len() + 32);
    out.put_slice(head.method.as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(head.target.as_bytes());
    out.put_u8(b' ');
    out.put_slice(head.version.as_str().as_bytes());
    out.put_slice(b"\r\n");
    encode_headers(&head.headers, &mut out);
    out.freeze()
}

pub fn encode_response_head(head: &ResponseHead) -> Bytes {
    if let Some(raw) = &head.raw {
        return raw.clone();
    }
    let mut out = BytesMut::with_capacity(estimate(&head.headers) + head.reason.len() + 32);
    out.put_slice(head.version.as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(head.status.as_str().as_bytes());
    out.put_u8(b' ');
    out.put_slice(head.reason.as_bytes());
    out.put_slice(b"\r\n");
    encode_headers(&head.headers, &mut out);
    out.freeze()
}

/// Set framing headers for a body of `length` bytes, or chunked when unknown.
pub fn apply_framing(headers: &mut Headers, length: Option<u64>) -> BodyKind {
    headers.remove("transfer-encoding");
    match length {
        Some(length) => {
            headers.set("Content-Length", length.to_string());
            BodyKind::Length(length)
        }
        None => {
            headers.remove("content-length");
            headers.set("Transfer-Encoding", "chunked");
            BodyKind::Chunked
        }
    }
}

/// Frame one piece of payload as a chunk. Empty input yields nothing, since a
/// zero-size chunk would end the body.
pub fn encode_chunk(data: &[u8]) -> Bytes {
    if data.is_empty() {
        return Bytes::new();
    }
    let mut out = BytesMut::with_capacity(data.len() + 20);
    out.put_slice(format!("{:X}\r\n", data.len()).as_bytes());
    out.put_slice(data);
    out.put_slice(b"\r\n");
    out.freeze()
}

/// Wire form of a message body for the given framing.
pub fn encode_body(kind: BodyKind, payload: &[u8]) -> Bytes {
    match kind {
        BodyKind::Chunked => {
            let mut out = BytesMut::from(&encode_chunk(payload)[..]);
            out.put_slice(LAST_CHUNK);
            out.freeze()
        }
        _ => Bytes::copy_from_slice(payload),
    }
}

/// Full wire form of a response built in process.
///
/// `Content-Length` is set when the body is known, which is always the case
/// here; streamed bodies go through [`apply_framing`] with `None` instead.
pub fn encode_response(head: &mut ResponseHead, body: &[u8]) -> Bytes {
    let kind = apply_framing(&mut head.headers, Some(body.len() as u64));
    head.raw = None;
    let mut out = BytesMut::from(&encode_response_head(head)[..]);
    out.put_slice(&encode_body(kind, body));
    out.freeze()
}

fn encode_headers(headers: &Headers, out: &mut BytesMut) {
    for field in headers {
        out.put_slice(field.name().as_bytes());
        out.put_slice(b": ");
        out.put_slice(field.value());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
}

fn estimate(headers: &Headers) -> usize {
    headers
        .iter()
        .map(|field| field.name().len() + field.value().len() + 4)
        .sum::<usize>()
        + 2
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use http::{Method, StatusCode};

    use super::*;
    use crate::http::parser::{MessageParser, ParserLimits};

    #[test]
    fn request_head_is_reproduced_verbatim() {
        let raw = b"PUT /x?y=1 HTTP/1.1\r\nhost: a\r\nX-CUSTOM: 1\r\nx-custom: 2\r\nContent-Length: 0\r\n\r\n";
        let mut buf = BytesMut::from(&raw[..]);
        let request = MessageParser::new(ParserLimits::default())
            .parse_request(&mut buf)
            .unwrap()
            .unwrap();

        assert_eq!(&encode_request_head(&request.head)[..], &raw[..]);
    }

    #[test]
    fn response_head_keeps_reason_phrase() {
        let raw = b"HTTP/1.0 404 Nope\r\nServer: s\r\n\r\n";
        let mut buf = BytesMut::from(&raw[..]);
        let response = MessageParser::new(ParserLimits::default())
            .parse_response(&mut buf, &Method::GET)
            .unwrap()
            .unwrap();

        assert_eq!(&encode_response_head(&response.head)[..], &raw[..]);
    }

    #[test]
    fn parsed_head_is_not_normalized() {
        let raw = b"HTTP/1.1 200\r\nContent-Length:2\r\n\r\n";
        let mut buf = BytesMut::from(&raw[..]);
        let mut response = MessageParser::new(ParserLimits::default())
            .parse_response(&mut buf, &Method::GET)
            .unwrap()
            .unwrap();
        assert_eq!(&encode_response_head(&response.head)[..], &raw[..]);

        response.head.raw = None;
        assert_eq!(
            &encode_response_head(&response.head)[..],
            b"HTTP/1.1 200 \r\nContent-Length: 2\r\n\r\n"
        );
    }

    #[test]
    fn known_length_sets_content_length() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.headers.append("Transfer-Encoding", "chunked");
        let wire = encode_response(&mut head, b"hello");
        assert_eq!(
            &wire[..],
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"
        );
    }

    #[test]
    fn unknown_length_uses_chunked_framing() {
        let mut headers = Headers::new();
        headers.append("Content-Length", "99");
        let kind = apply_framing(&mut headers, None);

        assert_eq!(kind, BodyKind::Chunked);
        assert!(!headers.contains("content-length"));
        assert_eq!(headers.get_str("transfer-encoding"), Some("chunked"));
        assert_eq!(&encode_body(kind, b"0123456789abcdef!")[..], b"11\r\n0123456789abcdef!\r\n0\r\n\r\n");
        assert!(encode_chunk(b"").is_empty());
    }
}
