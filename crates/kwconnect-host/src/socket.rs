//! Loopback socket binding for the transport adapter.
//!
//! Newline-delimited JSON over TCP. Each line is a [`Frame`]: the sender's
//! declared origin plus the message itself, mirroring a window
//! `postMessage` event. Replies go back on the same connection. Lines are
//! capped at [`MAX_FRAME_SIZE`]; a longer line closes the connection.
//!
//! The message source is decided here, from the peer address: only
//! loopback peers count as [`MessageSource::Local`]. That is the only check
//! this binding can actually enforce. `Frame::origin` is whatever the
//! sender wrote, so the adapter's origin filter only separates cooperating
//! local clients; it does not authenticate them.
//!
//! Connection tasks belong to [`serve`]. Aborting the serve task drops them
//! with it, so nothing is answered once the listener is gone.

use std::net::SocketAddr;
use std::time::Duration;

use kwconnect_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::transport::{AdapterHandle, InboundMessage, MessageSource};

/// Longest accepted line, newline excluded.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// One line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Declared by the sender, not verified.
    pub origin: String,
    pub data: Value,
}

/// Accept connections until the listener fails or the task is aborted.
///
/// Open connections are closed when this future is dropped.
pub async fn serve(listener: TcpListener, adapter: AdapterHandle) -> Result<()> {
    info!("browser extension listener on {}", listener.local_addr()?);

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let adapter = adapter.clone();

                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, adapter).await {
                        debug!("connection from {} closed: {}", peer, e);
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, adapter: AdapterHandle) -> Result<()> {
    let source = if peer.ip().is_loopback() {
        MessageSource::Local
    } else {
        warn!("connection from non-loopback peer {}", peer);
        MessageSource::Foreign
    };

    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut line = Vec::new();

    loop {
        line.clear();
        let bytes = (&mut reader)
            .take(MAX_FRAME_SIZE as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if bytes == 0 {
            break;
        }
        if line.last() != Some(&b'\n') && line.len() > MAX_FRAME_SIZE {
            warn!("closing connection from {}: frame exceeds {} bytes", peer, MAX_FRAME_SIZE);
            return Err(Error::protocol("frame too large"));
        }

        let frame: Frame = match serde_json::from_slice(&line) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("ignoring unparseable frame from {}: {}", peer, e);
                continue;
            }
        };

        let message = InboundMessage {
            origin: frame.origin,
            source,
            data: frame.data,
        };

        if let Some(reply) = adapter.submit(message).await {
            write_frame(
                &mut write,
                &Frame {
                    origin: reply.origin,
                    data: reply.data,
                },
            )
            .await?;
        }
    }

    Ok(())
}

async fn write_frame(write: &mut OwnedWriteHalf, frame: &Frame) -> Result<()> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    write.write_all(&line).await?;
    write.flush().await?;
    Ok(())
}

/// Client end of the socket binding.
pub struct SocketClient {
    origin: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
    reply_timeout: Duration,
}

impl SocketClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Connect to a host, declaring `origin` on every frame.
    pub async fn connect(addr: SocketAddr, origin: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read, write) = stream.into_split();

        Ok(Self {
            origin: origin.into(),
            lines: BufReader::new(read).lines(),
            write,
            reply_timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Send one message without waiting for a reply.
    pub async fn send(&mut self, data: Value) -> Result<()> {
        let frame = Frame {
            origin: self.origin.clone(),
            data,
        };
        write_frame(&mut self.write, &frame).await
    }

    /// Wait for the next reply.
    pub async fn recv(&mut self) -> Result<Frame> {
        let line = timeout(self.reply_timeout, self.lines.next_line())
            .await
            .map_err(|_| Error::timeout("no reply from host"))??
            .ok_or_else(|| Error::protocol("host closed the connection"))?;

        Ok(serde_json::from_str(&line)?)
    }

    /// Send a message and wait for its reply.
    pub async fn call(&mut self, data: Value) -> Result<Value> {
        self.send(data).await?;
        Ok(self.recv().await?.data)
    }
}
