//! Player-facing TCP socket for one gateway port.
//!
//! Each `[[servers]]` entry binds one `Listener`. Every accepted player holds a
//! [`ConnectionPermit`] until its session's socket tasks finish, so a port never has
//! more than `session.max_connections` live players; further players wait in the
//! kernel backlog until a session ends.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug)]
pub enum ListenerError {
    /// The port could not be bound (in use, no permission, bad `bind_host`).
    Bind(std::io::Error),
    /// `accept` failed for one player; the port stays open.
    Accept(std::io::Error),
    /// The session slot pool is gone; the port can take no more players.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Cannot bind gateway port: {}", e),
            ListenerError::Accept(e) => write!(f, "Player accept failed: {}", e),
            ListenerError::Closed => write!(f, "Session slots closed"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bound gateway port with a fixed number of player slots.
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind `bind_host:listen_port` with `max_connections` player slots.
    pub async fn bind(config: &ListenerConfig, max_connections: usize) -> Result<Self, ListenerError> {
        let socket = TcpListener::bind(config.bind_address())
            .await
            .map_err(ListenerError::Bind)?;
        let local_addr = socket.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            port = config.listen_port,
            address = %local_addr,
            max_connections,
            "Gateway port bound"
        );

        Ok(Self {
            socket,
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Wait for a free player slot, then for the next player.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(
            peer = %peer,
            free_slots = self.slots.available_permits(),
            "Player connection accepted"
        );

        Ok((stream, peer, ConnectionPermit { _slot: slot }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Player slots not currently held by a session.
    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One player slot. Held by the session's reader task; dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}
