//! One TCP session to a tipjar server.
//!
//! A [`Connection`] owns the socket and speaks the framing layer: every
//! message crosses the wire as a 4-byte big-endian length prefix followed
//! by that many payload bytes. Interpretation of payloads happens above,
//! in the RPC layer.

use crate::error::{ClientError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tipjar_core::wire::{DecodeError, FRAME_HEADER_LEN, MAX_FRAME_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, trace};

/// One established TCP session.
///
/// Writes are serialized internally, so any number of tasks may send
/// frames concurrently without interleaving. Reads are not: exactly one
/// task (the RPC reader loop) consumes frames.
pub(crate) struct Connection {
    read: Mutex<OwnedReadHalf>,
    write: Mutex<OwnedWriteHalf>,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl Connection {
    /// Open a TCP session to `host:port` within `connect_timeout`.
    pub(crate) async fn open(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                ClientError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {host}:{port} timed out"),
                ))
            })??;

        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!(peer = %peer, "connection open");

        let (read, write) = stream.into_split();
        Ok(Self {
            read: Mutex::new(read),
            write: Mutex::new(write),
            peer,
            closed: AtomicBool::new(false),
        })
    }

    /// The address of the connected server.
    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write one `[len][payload]` frame.
    ///
    /// The write half stays locked for the whole frame, so frames from
    /// concurrent callers never interleave on the wire.
    pub(crate) async fn send_frame(&self, payload: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::ConnectionClosed);
        }
        let len = payload.len();
        if len > MAX_FRAME_LEN {
            return Err(ClientError::MalformedFrame(DecodeError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            }));
        }

        let mut write = self.write.lock().await;
        write.write_all(&(len as u32).to_be_bytes()).await?;
        write.write_all(payload).await?;
        write.flush().await?;
        trace!(bytes = len, "frame sent");
        Ok(())
    }

    /// Read one frame and return its payload.
    ///
    /// An end-of-stream at any point, mid-header included, reports as
    /// [`ClientError::ConnectionClosed`]. A length prefix beyond
    /// [`MAX_FRAME_LEN`] reports as a malformed frame without reading the
    /// payload.
    pub(crate) async fn recv_frame(&self) -> Result<Vec<u8>> {
        let mut read = self.read.lock().await;

        let mut header = [0u8; FRAME_HEADER_LEN];
        read.read_exact(&mut header).await.map_err(map_read_err)?;

        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            return Err(ClientError::MalformedFrame(DecodeError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            }));
        }

        let mut payload = vec![0u8; len];
        read.read_exact(&mut payload).await.map_err(map_read_err)?;
        trace!(bytes = len, "frame received");
        Ok(payload)
    }

    /// Close the socket. Safe to call repeatedly; only the first call
    /// does anything.
    pub(crate) async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut write = self.write.lock().await;
        if let Err(e) = write.shutdown().await {
            trace!(error = %e, "socket shutdown failed");
        }
        debug!(peer = %self.peer, "connection closed");
    }
}

fn map_read_err(e: std::io::Error) -> ClientError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ClientError::ConnectionClosed,
        _ => ClientError::Connection(e),
    }
}

// ============================================================================
// Tests
// ============================================================================
