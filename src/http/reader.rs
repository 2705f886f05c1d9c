//! Async message reader on top of [`MessageParser`].
//!
//! The reader owns the receive buffer for one direction of a connection but
//! not the stream itself, so a session can lend the same stream to other
//! phases between reads.

use std::io;

use bytes::{Bytes, BytesMut};
use http::Method;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::error::ProtocolError;
use crate::http::message::{Frame, Request, Response};
use crate::http::parser::{Decoded, MessageParser, ParseState, ParserLimits};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Reads successive messages from one direction of a connection.
#[derive(Debug)]
pub struct MessageReader {
    parser: MessageParser,
    buf: BytesMut,
    bytes_read: u64,
}

impl MessageReader {
    pub fn new(limits: ParserLimits) -> Self {
        Self {
            parser: MessageParser::new(limits),
            buf: BytesMut::with_capacity(READ_CHUNK),
            bytes_read: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.parser.state()
    }

    pub fn is_complete(&self) -> bool {
        self.parser.is_complete()
    }

    /// Total bytes received from the stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Ready the reader for the next message of a persistent connection.
    pub fn reset(&mut self) -> bool {
        self.parser.reset()
    }

    /// Read a request head.
    ///
    /// Returns `Ok(None)` if the peer closed the stream before sending anything.
    pub async fn read_request<R>(&mut self, io: &mut R) -> Result<Option<Request>, ReadError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(request) = self.parser.parse_request(&mut self.buf)? {
                return Ok(Some(request));
            }
            if self.fill(io).await? == 0 {
                return self.eof_before_head();
            }
        }
    }

    /// Read a response head for a request made with `request_method`.
    ///
    /// Returns `Ok(None)` if the peer closed the stream before sending anything.
    pub async fn read_response<R>(
        &mut self,
        io: &mut R,
        request_method: &Method,
    ) -> Result<Option<Response>, ReadError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(response) = self.parser.parse_response(&mut self.buf, request_method)? {
                return Ok(Some(response));
            }
            if self.fill(io).await? == 0 {
                return self.eof_before_head();
            }
        }
    }

    /// Next body frame of the current message, `None` once the body has ended.
    pub async fn next_frame<R>(&mut self, io: &mut R) -> Result<Option<Frame>, ReadError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match self.parser.decode_body(&mut self.buf)? {
                Decoded::Frame(frame) => return Ok(Some(frame)),
                Decoded::Done => return Ok(None),
                Decoded::NeedMore => {
                    if self.fill(io).await? == 0 {
                        if self.parser.finish_on_eof() {
                            return Ok(None);
                        }
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "peer closed the stream mid-body",
                        )
                        .into());
                    }
                }
            }
        }
    }

    /// The body of the message whose head was just read.
    pub fn body<'a, R>(&'a mut self, io: &'a mut R) -> Body<'a, R>
    where
        R: AsyncRead + Unpin,
    {
        Body { reader: self, io }
    }

    async fn fill<R>(&mut self, io: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.buf.reserve(READ_CHUNK);
        let n = io.read_buf(&mut self.buf).await?;
        self.bytes_read += n as u64;
        Ok(n)
    }

    fn eof_before_head<T>(&self) -> Result<Option<T>, ReadError> {
        if self.parser.in_progress() || !self.buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the stream mid-head",
            )
            .into());
        }
        Ok(None)
    }
}

/// Single-pass view of a message body.
///
/// Consuming methods take `self`, so a body cannot be read twice; once the
/// last frame has been returned every further call yields `None`.
pub struct Body<'a, R> {
    reader: &'a mut MessageReader,
    io: &'a mut R,
}

impl<R> Body<'_, R>
where
    R: AsyncRead + Unpin,
{
    /// Next frame, with bytes exactly as they were on the wire.
    pub async fn frame(&mut self) -> Result<Option<Frame>, ReadError> {
        self.reader.next_frame(&mut *self.io).await
    }

    /// Collect the decoded payload, failing once it grows past `limit`.
    pub async fn collect(mut self, limit: usize) -> Result<Bytes, ReadError> {
        let mut collected = BytesMut::new();
        while let Some(frame) = self.frame().await? {
            if let Frame::Data(data) = frame {
                if collected.len() + data.len() > limit {
                    return Err(ReadError::BodyTooLarge { limit });
                }
                collected.extend_from_slice(&data);
            }
        }
        Ok(collected.freeze())
    }

    /// Read and drop the rest of the body. Returns the wire bytes skipped.
    pub async fn discard(mut self) -> Result<u64, ReadError> {
        let mut skipped = 0;
        while let Some(frame) = self.frame().await? {
            skipped += frame.wire().len() as u64;
        }
        Ok(skipped)
    }
}
