//! Responses produced by the server itself.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http::StatusCode;

use crate::http::writer::{apply_framing, encode_response, encode_response_head};
use crate::http::ResponseHead;

/// Value of the `Server` header on locally produced responses.
pub const SERVER_NAME: &str = concat!("bridge-servers/", env!("CARGO_PKG_VERSION"));

/// Current time in the IMF-fixdate form of the `Date` header.
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// A locally produced response, head and body already on wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub head: Bytes,
    pub body: Bytes,
}

/// `200` text response carrying `body`.
pub fn plain_text(body: impl Into<Bytes>) -> Encoded {
    let body = body.into();
    let mut head = ResponseHead::new(StatusCode::OK);
    head.headers.append("Date", http_date());
    head.headers.append("Server", SERVER_NAME);
    head.headers.append("Content-Type", "text/plain; charset=utf-8");
    apply_framing(&mut head.headers, Some(body.len() as u64));
    Encoded {
        head: encode_response_head(&head),
        body,
    }
}

/// Answer of the delay endpoint after sleeping for `pause`.
pub fn hello(pause: Duration) -> Encoded {
    plain_text(format!("Hello world!\nPause: {}ms.\n", pause.as_millis()))
}

/// Empty-bodied error response that closes the connection.
pub fn error(status: StatusCode) -> Bytes {
    let mut head = ResponseHead::new(status);
    head.headers.append("Date", http_date());
    head.headers.append("Server", SERVER_NAME);
    head.headers.append("Connection", "close");
    encode_response(&mut head, &[])
}

/// `/YYYY/MM/DD`: four, two and two ASCII digits.
pub fn is_date_path(path: &str) -> bool {
    let mut parts = path.split('/');
    if parts.next() != Some("") {
        return false;
    }
    let widths = [4, 2, 2];
    for width in widths {
        match parts.next() {
            Some(part) if part.len() == width && part.bytes().all(|b| b.is_ascii_digit()) => {}
            _ => return false,
        }
    }
    parts.next().is_none()
}
