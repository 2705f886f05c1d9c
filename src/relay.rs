//! The pipe peer: copies a byte stream pair (normally stdin/stdout) to and
//! from a TCP destination.
//!
//! The relay never interprets HTTP. It stops once the destination closes its
//! side; end of input alone does not half-close the socket, since servers in
//! this crate treat a half-closed client as gone.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::transport::{self, TransportError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Input bytes sent to the destination.
    pub sent: u64,
    /// Destination bytes written to the output.
    pub received: u64,
}

/// Connect to `target` and shuttle bytes until the destination closes.
///
/// Nothing is written to `output` when the connect fails.
pub async fn relay<R, W>(
    mut input: R,
    mut output: W,
    target: &str,
    connect_timeout: Duration,
) -> Result<RelayStats, TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut upstream = transport::connect(target, connect_timeout).await?;
    tracing::debug!(destination = target, connection_id = %upstream.id(), "Relay connected");

    let stats = {
        let (mut from_destination, mut to_destination) = tokio::io::split(&mut upstream);
        let send = tokio::io::copy(&mut input, &mut to_destination);
        let receive = async {
            let n = tokio::io::copy(&mut from_destination, &mut output).await?;
            output.flush().await?;
            Ok::<_, std::io::Error>(n)
        };
        tokio::pin!(send, receive);

        let mut stats = RelayStats::default();
        let mut input_open = true;
        loop {
            tokio::select! {
                sent = &mut send, if input_open => {
                    input_open = false;
                    stats.sent = sent.map_err(TransportError::from_io)?;
                    tracing::trace!(sent = stats.sent, "Relay input finished");
                }
                received = &mut receive => {
                    stats.received = received.map_err(TransportError::from_io)?;
                    break;
                }
            }
        }
        stats
    };

    upstream.close().await;
    Ok(stats)
}
