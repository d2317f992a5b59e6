//! Packet relay between a game client and its assigned backend.
//!
//! # Data Flow
//! ```text
//! client bytes → on_data → PacketFramer → whole packets → upstream queue
//!                                                            ↓
//!                           relay task: [reputation check] → connect backend
//!                                                            ↓
//!                           backend bytes → ClientSink → client socket
//! ```
//!
//! # Responsibilities
//! - Frame client traffic so only complete packets reach the backend
//! - Bound what a client can queue ahead of the backend; overflow or a malformed
//!   header closes the client
//! - Connect to the backend with a timeout and track failed attempts
//! - Optionally refuse clients on hosting-provider addresses
//! - Release the backend slot exactly once when the session ends

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::GatewayError;
use crate::load_balancer::{BackendLease, RoutingServer, ServerDetails};
use crate::net::connection::{peer_ip, ClientSink, SessionId};
use crate::net::session::{SessionContext, SessionFactory, SessionHandler};
use crate::observability::metrics;
use crate::protocol::{CodecError, PacketFramer};
use crate::reputation::ReputationClient;

const BACKEND_READ_BUFFER: usize = 8 * 1024;

#[derive(Debug)]
struct RelaySettings {
    connect_timeout: Duration,
    max_failed_attempts: u32,
    upstream_queue: usize,
    reputation: Option<ReputationClient>,
    reject_hosting_ips: bool,
}

/// Builds a [`RelaySession`] per accepted client.
#[derive(Debug, Clone)]
pub struct RelayFactory {
    settings: Arc<RelaySettings>,
}

impl RelayFactory {
    pub fn new(session: &SessionConfig) -> Self {
        Self {
            settings: Arc::new(RelaySettings {
                connect_timeout: Duration::from_secs(session.connect_timeout_secs),
                max_failed_attempts: session.max_failed_attempts,
                upstream_queue: session.upstream_queue_packets.max(1),
                reputation: None,
                reject_hosting_ips: false,
            }),
        }
    }

    /// Check each client's address before connecting it upstream.
    pub fn with_reputation(session: &SessionConfig, client: ReputationClient, reject_hosting_ips: bool) -> Self {
        Self {
            settings: Arc::new(RelaySettings {
                connect_timeout: Duration::from_secs(session.connect_timeout_secs),
                max_failed_attempts: session.max_failed_attempts,
                upstream_queue: session.upstream_queue_packets.max(1),
                reputation: Some(client),
                reject_hosting_ips,
            }),
        }
    }
}

impl SessionFactory for RelayFactory {
    fn create(&self, ctx: SessionContext) -> Box<dyn SessionHandler> {
        Box::new(RelaySession::start(ctx, Arc::clone(&self.settings)))
    }
}

/// One client's relay. Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct RelaySession {
    id: SessionId,
    backend: RoutingServer,
    framer: PacketFramer,
    upstream: mpsc::Sender<Bytes>,
    client: ClientSink,
    task: JoinHandle<()>,
    lease: Option<BackendLease>,
}

impl RelaySession {
    fn start(ctx: SessionContext, settings: Arc<RelaySettings>) -> Self {
        let (upstream, upstream_rx) = mpsc::channel(settings.upstream_queue);
        let task = tokio::spawn(relay(
            ctx.id,
            ctx.peer_addr.map(|addr| peer_ip(&addr).to_string()),
            ctx.backend.clone(),
            Arc::clone(ctx.lease.details()),
            ctx.client.clone(),
            upstream_rx,
            settings,
        ));

        Self {
            id: ctx.id,
            backend: ctx.backend,
            framer: PacketFramer::new(),
            upstream,
            client: ctx.client,
            task,
            lease: Some(ctx.lease),
        }
    }
}

impl SessionHandler for RelaySession {
    fn on_data(&mut self, data: &[u8]) -> Result<(), GatewayError> {
        let batch = self.framer.push(data);
        if !batch.packets.is_empty() {
            metrics::record_packets_framed(batch.packets.len());
        }

        for packet in batch.packets {
            tracing::trace!(
                session_id = %self.id,
                packet_type = packet.type_id(),
                length = packet.total_length(),
                "Forwarding packet"
            );
            match self.upstream.try_send(packet.into_bytes()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.client.close();
                    return Err(GatewayError::UpstreamFull(self.id));
                }
                Err(TrySendError::Closed(_)) => return Err(GatewayError::UpstreamClosed(self.id)),
            }
        }

        if let Some(length) = batch.malformed {
            metrics::record_malformed_packet();
            self.client.close();
            return Err(CodecError::MalformedHeader(length).into());
        }

        if batch.discarded > 0 {
            tracing::debug!(session_id = %self.id, bytes = batch.discarded, "Discarded bytes after zero-length header");
        }
        Ok(())
    }

    fn on_error(&mut self, error: &std::io::Error) {
        tracing::debug!(session_id = %self.id, backend = %self.backend.name, error = %error, "Relay client error");
    }

    fn on_close(&mut self) {
        self.task.abort();
        self.lease.take();
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn relay(
    id: SessionId,
    peer_ip: Option<String>,
    backend: RoutingServer,
    details: Arc<ServerDetails>,
    client: ClientSink,
    upstream_rx: mpsc::Receiver<Bytes>,
    settings: Arc<RelaySettings>,
) {
    if let (Some(reputation), Some(ip)) = (&settings.reputation, &peer_ip) {
        match reputation.check_ip(ip).await {
            Ok(true) if settings.reject_hosting_ips => {
                tracing::info!(session_id = %id, peer = %ip, "Rejected client on hosting-provider address");
                client.close();
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(session_id = %id, peer = %ip, error = %e, "Reputation lookup failed, allowing client"),
        }
    }

    let connect = tokio::time::timeout(settings.connect_timeout, TcpStream::connect(&backend.address)).await;
    let stream = match connect {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            connect_failed(id, &backend, &details, settings.max_failed_attempts, &e.to_string());
            client.close();
            return;
        }
        Err(_) => {
            connect_failed(id, &backend, &details, settings.max_failed_attempts, "timed out");
            client.close();
            return;
        }
    };

    details.record_successful_connect();
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(session_id = %id, error = %e, "Failed to set TCP_NODELAY on backend socket");
    }
    tracing::debug!(session_id = %id, backend = %backend.name, address = %backend.address, "Connected to backend");

    match pump(id, stream, &client, upstream_rx).await {
        Ok(()) => tracing::debug!(session_id = %id, backend = %backend.name, "Relay finished"),
        Err(e) => tracing::debug!(session_id = %id, backend = %backend.name, error = %e, "Relay ended"),
    }
    client.close();
}

fn connect_failed(id: SessionId, backend: &RoutingServer, details: &ServerDetails, threshold: u32, reason: &str) {
    tracing::warn!(
        session_id = %id,
        backend = %backend.name,
        address = %backend.address,
        reason,
        "Backend connection failed"
    );
    if details.record_failed_attempt(threshold) {
        tracing::warn!(
            backend = %backend.name,
            attempts = details.failed_conn_attempts(),
            "Backend disabled after repeated connection failures"
        );
    }
}

async fn pump(
    id: SessionId,
    stream: TcpStream,
    client: &ClientSink,
    mut upstream_rx: mpsc::Receiver<Bytes>,
) -> Result<(), GatewayError> {
    let (mut backend_read, mut backend_write) = stream.into_split();
    let mut buf = BytesMut::with_capacity(BACKEND_READ_BUFFER);

    loop {
        tokio::select! {
            outbound = upstream_rx.recv() => match outbound {
                Some(bytes) => backend_write.write_all(&bytes).await?,
                None => return Ok(()),
            },
            read = backend_read.read_buf(&mut buf) => {
                if read? == 0 {
                    return Err(GatewayError::UpstreamClosed(id));
                }
                if !client.send(buf.split().freeze()) {
                    return Err(GatewayError::ClientClosed(id));
                }
                buf.reserve(BACKEND_READ_BUFFER);
            }
        }
    }
}
