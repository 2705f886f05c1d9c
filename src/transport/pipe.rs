//! Pipe backend: a child process whose stdin/stdout carry raw HTTP bytes.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::transport::{Connection, TransportError};

/// How long a killed relay gets to be reaped before it is left to the runtime.
const REAP_TIMEOUT: Duration = Duration::from_millis(500);

/// Program and arguments of the relay peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RelaySpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Start the relay process and wrap its pipes as an outbound [`Connection`].
pub fn spawn_relay(spec: &RelaySpec) -> Result<Connection, TransportError> {
    let unavailable = |source: io::Error| TransportError::RelayUnavailable {
        program: spec.program.display().to_string(),
        source,
    };

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(unavailable)?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| unavailable(io::Error::new(io::ErrorKind::Other, "stdin not captured")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| unavailable(io::Error::new(io::ErrorKind::Other, "stdout not captured")))?;

    tracing::debug!(program = %spec.program.display(), pid = ?child.id(), "Relay spawned");

    Ok(Connection::pipe(PipeRelay {
        child,
        stdin: Some(stdin),
        stdout,
    }))
}

/// Both ends of the pipe pair plus the process that owns them.
pub struct PipeRelay {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
}

impl PipeRelay {
    /// Close stdin, stop the process and reap it.
    pub(crate) async fn close(&mut self) {
        self.stdin.take();
        let _ = self.child.start_kill();
        if tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await.is_err() {
            tracing::warn!(pid = ?self.child.id(), "Relay did not exit after kill");
        }
    }
}

impl AsyncRead for PipeRelay {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for PipeRelay {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}
