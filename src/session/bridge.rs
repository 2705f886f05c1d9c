//! One inbound connection, one request, one response.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tracing::Instrument;

use crate::delay::{DelayInjector, Release};
use crate::http::writer::{encode_request_head, encode_response_head};
use crate::http::{MessageReader, ReadError, Request, Response};
use crate::session::rewrite::{self, DataQuery};
use crate::session::synthetic::{self, Encoded};
use crate::session::{
    BridgeTopology, PauseRange, Rewrite, SessionContext, SessionError, SessionOutcome, SessionReport,
    SessionState,
};
use crate::transport::{self, Connection, ConnectionId, TransportError};

/// How long a client asking for `100 Continue` waits for the upstream to
/// answer before its body is forwarded regardless.
const CONTINUE_WAIT: Duration = Duration::from_secs(1);

/// Session phase and response status, kept apart from the inbound connection
/// so both can be borrowed at once.
#[derive(Debug)]
struct Progress {
    state: SessionState,
    status: Option<StatusCode>,
}

impl Progress {
    fn enter(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(from = %self.state, to = %next, "Session state changed");
        self.state = next;
    }
}

/// Bridge session bound to one accepted connection.
///
/// Owns the inbound connection and, once opened, the outbound one. Both are
/// closed before [`run`](Self::run) returns, whatever the outcome.
pub struct BridgeSession {
    inbound: Connection,
    peer: SocketAddr,
    ctx: Arc<SessionContext>,
    progress: Progress,
}

impl BridgeSession {
    pub fn new(inbound: Connection, peer: SocketAddr, ctx: Arc<SessionContext>) -> Self {
        Self {
            inbound,
            peer,
            ctx,
            progress: Progress {
                state: SessionState::Accepted,
                status: None,
            },
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inbound.id()
    }

    pub fn state(&self) -> SessionState {
        self.progress.state
    }

    /// Drive the session to `Closed` or `Errored`.
    pub async fn run(self) -> SessionReport {
        let span = tracing::info_span!("session", id = %self.inbound.id(), peer = %self.peer);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> SessionReport {
        let started = Instant::now();
        let mut outbound = None;
        let result = self.exchange(&mut outbound).await;

        let (outcome, error) = match result {
            Ok(outcome) => {
                self.progress.enter(SessionState::Closed);
                (outcome, None)
            }
            Err(err) => {
                if matches!(err, SessionError::UpstreamUnavailable(_)) && self.progress.status.is_none() {
                    // The client may be gone already; nothing else to do then.
                    let _ = self.reply_error(StatusCode::BAD_GATEWAY).await;
                }
                tracing::warn!(
                    error = %err,
                    kind = err.label(),
                    state = %self.progress.state,
                    "Session failed"
                );
                self.progress.enter(SessionState::Errored);
                (SessionOutcome::Failed, Some(err))
            }
        };

        if let Some(upstream) = outbound.as_mut() {
            upstream.close().await;
        }
        self.inbound.close().await;

        let report = SessionReport {
            outcome,
            final_state: self.progress.state,
            status: self.progress.status,
            bytes_to_client: self.inbound.bytes_written(),
            duration: started.elapsed(),
            error,
        };
        tracing::debug!(
            outcome = report.outcome.as_str(),
            status = ?report.status.map(|status| status.as_u16()),
            bytes = report.bytes_to_client,
            duration_ms = report.duration.as_millis() as u64,
            "Session closed"
        );
        report
    }

    async fn exchange(&mut self, outbound: &mut Option<Connection>) -> Result<SessionOutcome, SessionError> {
        let ctx = Arc::clone(&self.ctx);

        self.progress.enter(SessionState::ParsingRequest);
        let mut client = MessageReader::new(ctx.limits);
        let request = timeout(ctx.timeouts.request, client.read_request(&mut self.inbound))
            .await
            .map_err(|_| SessionError::timed_out(SessionState::ParsingRequest))??;
        let Some(request) = request else {
            tracing::debug!("Client closed before sending a request");
            return Ok(SessionOutcome::NoRequest);
        };
        tracing::debug!(
            method = %request.head.method,
            uri = %request.head.target,
            keep_alive = request.head.keep_alive(),
            "Request received"
        );

        self.progress.enter(SessionState::Forwarding);
        match &ctx.topology {
            BridgeTopology::Synthetic { pause } => self.serve_synthetic(&ctx, &mut client, request, *pause).await,
            BridgeTopology::Direct { .. } | BridgeTopology::Pipe { .. } => {
                self.bridge(&ctx, &mut client, request, outbound).await
            }
        }
    }

    async fn bridge(
        &mut self,
        ctx: &SessionContext,
        client: &mut MessageReader,
        request: Request,
        outbound: &mut Option<Connection>,
    ) -> Result<SessionOutcome, SessionError> {
        let query = match ctx.rewrite {
            Rewrite::None => None,
            Rewrite::DataQuery => {
                self.discard_request_body(ctx, client).await?;
                match DataQuery::from_request(&request.head) {
                    Some(query) => Some(query),
                    None => {
                        self.reply_error(StatusCode::NOT_IMPLEMENTED).await?;
                        return Ok(SessionOutcome::Completed);
                    }
                }
            }
        };

        let upstream = outbound.insert(open_outbound(ctx).await.map_err(SessionError::UpstreamUnavailable)?);
        tracing::debug!(upstream_id = %upstream.id(), kind = upstream.kind(), "Outbound path open");

        let upstream_head = match &query {
            Some(query) => query.upstream_request(ctx.topology.destination().unwrap_or_default()),
            None => request.head.clone(),
        };

        let method = upstream_head.method.clone();
        let expects_continue = query.is_none()
            && !request.body.is_empty()
            && request.head.headers.has_token("expect", "100-continue");
        let mut reader = MessageReader::new(ctx.limits);

        let inbound = &mut self.inbound;
        let forward = async {
            upstream
                .write_bytes(&encode_request_head(&upstream_head))
                .await
                .map_err(upstream_write_failed)?;
            if query.is_some() {
                return Ok(None);
            }
            if expects_continue {
                let early = await_continue(&mut reader, upstream, &mut *inbound, &method).await?;
                if early.is_some() {
                    // Final answer before the body: the body is never sent.
                    return Ok(early);
                }
            }
            let mut body = client.body(&mut *inbound);
            while let Some(frame) = body.frame().await? {
                upstream.write_bytes(frame.wire()).await.map_err(upstream_write_failed)?;
            }
            Ok::<_, SessionError>(None)
        };
        let early = timeout(ctx.timeouts.request, forward)
            .await
            .map_err(|_| SessionError::timed_out(SessionState::Forwarding))??;

        self.progress.enter(SessionState::AwaitingUpstreamResponse);
        let progress = &mut self.progress;
        let (mut client_rx, client_tx) = tokio::io::split(&mut self.inbound);
        let work = async move {
            let response = match early {
                Some(response) => response,
                None => await_response(&mut reader, upstream, &method, ctx.timeouts.upstream).await?,
            };
            tracing::debug!(status = response.head.status.as_u16(), body = ?response.body, "Upstream responded");
            progress.enter(SessionState::RelayingResponse);

            match query {
                Some(query) => {
                    let body = timeout(
                        ctx.timeouts.upstream,
                        reader.body(upstream).collect(ctx.max_buffered_body),
                    )
                    .await
                    .map_err(|_| SessionError::timed_out(SessionState::RelayingResponse))??;
                    tracing::debug!(upstream_path = %query.target(), bytes = body.len(), "Data query answered");

                    progress.status = Some(StatusCode::OK);
                    let report = rewrite::report(&request.head, response.head.status, &body);
                    send_encoded(DelayInjector::new(ctx.delay, client_tx), synthetic::plain_text(report)).await
                }
                None => {
                    progress.status = Some(response.head.status);
                    let injector = DelayInjector::new(ctx.delay, client_tx);
                    relay_response(injector, &response, &mut reader, upstream, ctx.timeouts.upstream).await
                }
            }
        };
        until_disconnect(&mut client_rx, work).await
    }

    async fn serve_synthetic(
        &mut self,
        ctx: &SessionContext,
        client: &mut MessageReader,
        request: Request,
        pause: PauseRange,
    ) -> Result<SessionOutcome, SessionError> {
        self.discard_request_body(ctx, client).await?;
        if request.head.method != Method::GET || !synthetic::is_date_path(request.head.path()) {
            self.reply_error(StatusCode::NOT_FOUND).await?;
            return Ok(SessionOutcome::Completed);
        }

        self.progress.enter(SessionState::AwaitingUpstreamResponse);
        let pause = pause.sample();
        tracing::debug!(pause_ms = pause.as_millis() as u64, "Pausing before reply");

        let progress = &mut self.progress;
        let (mut client_rx, client_tx) = tokio::io::split(&mut self.inbound);
        let work = async move {
            tokio::time::sleep(pause).await;
            progress.enter(SessionState::RelayingResponse);
            progress.status = Some(StatusCode::OK);
            send_encoded(DelayInjector::new(ctx.delay, client_tx), synthetic::hello(pause)).await
        };
        until_disconnect(&mut client_rx, work).await
    }

    async fn discard_request_body(
        &mut self,
        ctx: &SessionContext,
        client: &mut MessageReader,
    ) -> Result<(), SessionError> {
        timeout(ctx.timeouts.request, client.body(&mut self.inbound).discard())
            .await
            .map_err(|_| SessionError::timed_out(SessionState::Forwarding))??;
        Ok(())
    }

    /// Send a locally produced error response, outside the delay policy.
    async fn reply_error(&mut self, status: StatusCode) -> Result<(), SessionError> {
        self.progress.status = Some(status);
        self.inbound.write_bytes(&synthetic::error(status)).await?;
        Ok(())
    }
}

async fn open_outbound(ctx: &SessionContext) -> Result<Connection, TransportError> {
    match &ctx.topology {
        BridgeTopology::Direct { destination } => transport::connect(destination, ctx.timeouts.connect).await,
        BridgeTopology::Pipe { relay, .. } => transport::spawn_relay(relay),
        BridgeTopology::Synthetic { .. } => Err(TransportError::Io(io::Error::new(
            io::ErrorKind::Unsupported,
            "synthetic topology has no outbound path",
        ))),
    }
}

fn upstream_write_failed(err: TransportError) -> SessionError {
    match err {
        TransportError::PeerClosed => SessionError::UpstreamUnavailable(err),
        err => SessionError::Transport(err),
    }
}

/// Read the final response head, skipping interim ones.
async fn await_response(
    reader: &mut MessageReader,
    upstream: &mut Connection,
    method: &Method,
    limit: Duration,
) -> Result<Response, SessionError> {
    loop {
        let response = timeout(limit, read_head(reader, upstream, method))
            .await
            .map_err(|_| SessionError::timed_out(SessionState::AwaitingUpstreamResponse))??;
        if !response.head.is_interim() {
            return Ok(response);
        }
        tracing::trace!(status = response.head.status.as_u16(), "Skipping interim response");
        reader.reset();
    }
}

/// Wait briefly for the upstream's reaction to `Expect: 100-continue`.
///
/// Interim responses are passed to the client as received. A final response
/// is returned so the caller can relay it without sending the body. If the
/// upstream stays silent the body goes out anyway.
async fn await_continue<W>(
    reader: &mut MessageReader,
    upstream: &mut Connection,
    client: &mut W,
    method: &Method,
) -> Result<Option<Response>, SessionError>
where
    W: AsyncWrite + Unpin,
{
    // Reading a head is cancel safe, so an expired wait loses nothing.
    let Ok(read) = timeout(CONTINUE_WAIT, read_head(reader, upstream, method)).await else {
        tracing::trace!("No interim response, sending body");
        return Ok(None);
    };
    let response = read?;
    if !response.head.is_interim() {
        return Ok(Some(response));
    }
    tracing::trace!(status = response.head.status.as_u16(), "Passing interim response to client");
    client
        .write_all(&encode_response_head(&response.head))
        .await
        .map_err(TransportError::from_io)?;
    client.flush().await.map_err(TransportError::from_io)?;
    reader.reset();
    Ok(None)
}

/// One response head from upstream. Closing before the first byte means the
/// destination is unavailable.
async fn read_head(
    reader: &mut MessageReader,
    upstream: &mut Connection,
    method: &Method,
) -> Result<Response, SessionError> {
    match reader.read_response(upstream, method).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(SessionError::UpstreamUnavailable(TransportError::PeerClosed)),
        Err(ReadError::Io(err)) if reader.bytes_read() == 0 && transport::is_disconnect(&err) => {
            Err(SessionError::UpstreamUnavailable(TransportError::from_io(err)))
        }
        Err(err) => Err(err.into()),
    }
}

/// Relay head and body exactly as received, timed by the injector.
async fn relay_response<W>(
    mut injector: DelayInjector<W>,
    response: &Response,
    reader: &mut MessageReader,
    upstream: &mut Connection,
    idle: Duration,
) -> Result<SessionOutcome, SessionError>
where
    W: AsyncWrite + Unpin,
{
    injector.write_head(&encode_response_head(&response.head)).await?;

    let mut body = reader.body(upstream);
    loop {
        let frame = timeout(idle, body.frame())
            .await
            .map_err(|_| SessionError::timed_out(SessionState::RelayingResponse))??;
        let Some(frame) = frame else {
            break;
        };
        if injector.write_body(frame.into_wire()).await? == Release::Truncated {
            return Ok(SessionOutcome::Truncated);
        }
    }

    injector.finish().await?;
    Ok(SessionOutcome::Completed)
}

async fn send_encoded<W>(mut injector: DelayInjector<W>, response: Encoded) -> Result<SessionOutcome, SessionError>
where
    W: AsyncWrite + Unpin,
{
    injector.write_head(&response.head).await?;
    if injector.write_body(response.body).await? == Release::Truncated {
        return Ok(SessionOutcome::Truncated);
    }
    injector.finish().await?;
    Ok(SessionOutcome::Completed)
}

/// Run `work` unless the client goes away first.
async fn until_disconnect<R, F, T>(client_rx: &mut R, work: F) -> Result<T, SessionError>
where
    R: AsyncRead + Unpin,
    F: Future<Output = Result<T, SessionError>>,
{
    tokio::select! {
        biased;
        result = work => result,
        () = client_gone(client_rx) => {
            tracing::debug!("Client disconnected, abandoning response");
            Err(SessionError::Transport(TransportError::PeerClosed))
        }
    }
}

/// Resolves once the client's side of the stream ends. Pipelined bytes are ignored.
async fn client_gone<R>(client_rx: &mut R)
where
    R: AsyncRead + Unpin,
{
    let mut scratch = [0u8; 512];
    loop {
        match client_rx.read(&mut scratch).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}
