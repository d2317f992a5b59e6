//! Session collaborator contract.
//!
//! The session manager owns bookkeeping; everything a session does with its
//! traffic lives behind [`SessionHandler`], built by a [`SessionFactory`].

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::GatewayError;
use crate::load_balancer::{BackendLease, BackendRegistry, RoutingServer};
use crate::net::connection::{ClientSink, IoHandles, SessionId};

/// Everything a new session is constructed from.
#[derive(Debug)]
pub struct SessionContext {
    pub id: SessionId,
    pub peer_addr: Option<SocketAddr>,
    pub backend: RoutingServer,
    /// Client slot on `backend`; the handler releases it on close.
    pub lease: BackendLease,
    pub registry: BackendRegistry,
    /// Writes back to the inbound client.
    pub client: ClientSink,
}

/// Per-session traffic logic.
pub trait SessionHandler: Send {
    /// Bytes read from the client, in socket order.
    fn on_data(&mut self, data: &[u8]) -> Result<(), GatewayError>;

    /// Transport failure on the client socket. A close follows.
    fn on_error(&mut self, error: &std::io::Error);

    /// The client socket closed. Must release the session's backend slot.
    fn on_close(&mut self);
}

/// Builds the handler for each accepted connection.
pub trait SessionFactory: Send {
    fn create(&self, ctx: SessionContext) -> Box<dyn SessionHandler>;
}

/// One tracked inbound connection.
pub struct ClientSession {
    pub(crate) id: SessionId,
    pub(crate) peer_addr: Option<SocketAddr>,
    pub(crate) backend: RoutingServer,
    pub(crate) created_at: Instant,
    pub(crate) handler: Box<dyn SessionHandler>,
    pub(crate) io: Option<IoHandles>,
}

impl ClientSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn backend(&self) -> &RoutingServer {
        &self.backend
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Stop socket callbacks for this session.
    pub(crate) fn detach(&mut self) {
        if let Some(io) = self.io.take() {
            io.abort();
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("backend", &self.backend.name)
            .field("created_at", &self.created_at)
            .finish()
    }
}
