//! Timed release of response bytes.
//!
//! The injector sits between the session and the client's write half. It
//! never reorders or alters bytes; it only decides when they go out and
//! whether the rest is dropped.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep_until, Instant};

use crate::delay::policy::DelayPolicy;
use crate::transport::TransportError;

/// What the caller should do after handing over body bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Keep feeding body bytes.
    Continue,
    /// The cutoff was reached and the client stream has been shut down.
    Truncated,
}

/// Counters reported when the injector finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorStats {
    /// Everything written, head included.
    pub bytes_written: u64,
    /// Body wire bytes written.
    pub body_bytes: u64,
    /// Number of separate timed releases of body bytes.
    pub releases: u64,
    pub truncated: bool,
}

pub struct DelayInjector<W> {
    policy: DelayPolicy,
    writer: W,
    /// Start of the relaying phase; `fixed` delays count from here.
    started: Instant,
    last_release: Option<Instant>,
    pending: BytesMut,
    stats: InjectorStats,
}

impl<W> DelayInjector<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(policy: DelayPolicy, writer: W) -> Self {
        Self {
            policy,
            writer,
            started: Instant::now(),
            last_release: None,
            pending: BytesMut::new(),
            stats: InjectorStats::default(),
        }
    }

    pub fn policy(&self) -> DelayPolicy {
        self.policy
    }

    pub fn stats(&self) -> InjectorStats {
        self.stats
    }

    /// Send the serialized head.
    pub async fn write_head(&mut self, head: &[u8]) -> Result<(), TransportError> {
        if let DelayPolicy::Fixed { delay } = self.policy {
            sleep_until(self.started + delay).await;
        }
        self.send(head).await?;
        self.last_release = Some(Instant::now());
        Ok(())
    }

    /// Hand over body wire bytes.
    pub async fn write_body(&mut self, bytes: Bytes) -> Result<Release, TransportError> {
        if self.stats.truncated {
            return Ok(Release::Truncated);
        }
        match self.policy {
            DelayPolicy::None | DelayPolicy::Fixed { .. } => {
                if let DelayPolicy::Fixed { delay } = self.policy {
                    sleep_until(self.started + delay).await;
                }
                self.send_body(&bytes).await?;
                Ok(Release::Continue)
            }
            DelayPolicy::PerChunk { chunk_size, delay } => {
                self.pending.extend_from_slice(&bytes);
                while self.pending.len() >= chunk_size {
                    let chunk = self.pending.split_to(chunk_size).freeze();
                    self.release_chunk(&chunk, delay).await?;
                }
                Ok(Release::Continue)
            }
            DelayPolicy::TruncateAfter { bytes: cutoff } => {
                let allowed = cutoff.saturating_sub(self.stats.body_bytes);
                if (bytes.len() as u64) <= allowed {
                    self.send_body(&bytes).await?;
                    return Ok(Release::Continue);
                }
                let head = bytes.slice(..allowed as usize);
                self.send_body(&head).await?;
                self.truncate().await;
                Ok(Release::Truncated)
            }
        }
    }

    /// Flush whatever is still held back and return the counters.
    pub async fn finish(&mut self) -> Result<InjectorStats, TransportError> {
        if let DelayPolicy::PerChunk { delay, .. } = self.policy {
            if !self.pending.is_empty() {
                let rest = self.pending.split().freeze();
                self.release_chunk(&rest, delay).await?;
            }
        }
        if !self.stats.truncated {
            self.writer.flush().await.map_err(TransportError::from_io)?;
        }
        Ok(self.stats)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn release_chunk(&mut self, chunk: &[u8], delay: std::time::Duration) -> Result<(), TransportError> {
        if let Some(last) = self.last_release {
            sleep_until(last + delay).await;
        }
        self.send_body(chunk).await?;
        self.last_release = Some(Instant::now());
        Ok(())
    }

    async fn send_body(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.send(bytes).await?;
        self.stats.body_bytes += bytes.len() as u64;
        self.stats.releases += 1;
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(bytes).await.map_err(TransportError::from_io)?;
        self.writer.flush().await.map_err(TransportError::from_io)?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(())
    }

    async fn truncate(&mut self) {
        self.stats.truncated = true;
        let _ = self.writer.shutdown().await;
        tracing::debug!(body_bytes = self.stats.body_bytes, "Response truncated");
    }
}
