//! Per-connection identity and socket I/O.
//!
//! # Responsibilities
//! - Assign session IDs for logging and bookkeeping
//! - Pump socket reads into ordered session events
//! - Drain the outbound queue into the socket
//! - Tear the socket down on request or on abort
//!
//! # Design Decisions
//! - One reader and one writer task per connection; neither touches session state
//! - Events for one connection are sent in socket order through a single channel
//! - Aborting both tasks is how a session is detached during shutdown

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::AbortHandle;

use crate::net::listener::ConnectionPermit;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Unique identifier of a session within one listener. IDs increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Socket lifecycle event delivered to the session manager.
#[derive(Debug)]
pub enum SessionEvent {
    Data { id: SessionId, bytes: Bytes },
    Error { id: SessionId, error: std::io::Error },
    Closed { id: SessionId },
}

#[derive(Debug)]
pub enum SinkCommand {
    Data(Bytes),
    Close,
}

/// Outbound half of a client connection, as seen by session logic.
#[derive(Debug, Clone)]
pub struct ClientSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
}

impl ClientSink {
    /// Create a sink and the receiver its writer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue bytes for the client. Returns false once the connection is gone.
    pub fn send(&self, bytes: Bytes) -> bool {
        self.tx.send(SinkCommand::Data(bytes)).is_ok()
    }

    /// Flush queued bytes, then close the connection.
    pub fn close(&self) {
        let _ = self.tx.send(SinkCommand::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Abort handles for a connection's reader and writer tasks.
#[derive(Debug)]
pub struct IoHandles {
    reader: AbortHandle,
    writer: AbortHandle,
}

impl IoHandles {
    /// Stop both tasks. No further events are emitted and the socket is dropped.
    pub fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Spawn the reader and writer tasks for an accepted connection.
///
/// The permit is held by the reader for the connection's lifetime.
pub fn spawn_io(
    id: SessionId,
    stream: TcpStream,
    events: mpsc::UnboundedSender<SessionEvent>,
    sink_rx: mpsc::UnboundedReceiver<SinkCommand>,
    permit: Option<ConnectionPermit>,
) -> IoHandles {
    let (read_half, write_half) = stream.into_split();
    let closing = Arc::new(Notify::new());

    let writer = tokio::spawn(write_loop(id, write_half, sink_rx, Arc::clone(&closing)));
    let reader = tokio::spawn(read_loop(id, read_half, events, closing, permit));

    IoHandles {
        reader: reader.abort_handle(),
        writer: writer.abort_handle(),
    }
}

async fn read_loop(
    id: SessionId,
    mut read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<SessionEvent>,
    closing: Arc<Notify>,
    _permit: Option<ConnectionPermit>,
) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    loop {
        tokio::select! {
            read = read_half.read_buf(&mut buf) => match read {
                Ok(0) => break,
                Ok(_) => {
                    let bytes = buf.split().freeze();
                    if events.send(SessionEvent::Data { id, bytes }).is_err() {
                        return;
                    }
                    buf.reserve(READ_BUFFER_SIZE);
                }
                Err(error) => {
                    let _ = events.send(SessionEvent::Error { id, error });
                    break;
                }
            },
            _ = closing.notified() => break,
        }
    }
    let _ = events.send(SessionEvent::Closed { id });
}

async fn write_loop(
    id: SessionId,
    mut write_half: OwnedWriteHalf,
    mut sink_rx: mpsc::UnboundedReceiver<SinkCommand>,
    closing: Arc<Notify>,
) {
    while let Some(command) = sink_rx.recv().await {
        match command {
            SinkCommand::Data(bytes) => {
                if let Err(e) = write_half.write_all(&bytes).await {
                    tracing::debug!(session_id = %id, error = %e, "Client write failed");
                    break;
                }
            }
            SinkCommand::Close => break,
        }
    }
    let _ = write_half.shutdown().await;
    closing.notify_one();
}

/// Peer IP for display and lookups; IPv4-mapped IPv6 addresses are shown as IPv4.
pub fn peer_ip(addr: &SocketAddr) -> IpAddr {
    match addr.ip() {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        ip => ip,
    }
}
