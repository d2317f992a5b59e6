//! Listening server for one configured port.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → SessionManager::accept (route + track)
//!     → spawn_io (reader/writer tasks)
//!     → SessionEvent channel
//!     → SessionManager::handle_event
//! ```
//!
//! # Design Decisions
//! - One task owns the manager; accept, events, reloads and shutdown are multiplexed
//!   with `select!` so session state is never shared
//! - A connection refused by routing is dropped immediately

use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};

use crate::config::{ListenerConfig, SessionConfig};
use crate::load_balancer::BackendRegistry;
use crate::net::connection::{spawn_io, ClientSink, SessionEvent};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::manager::SessionManager;
use crate::net::session::SessionFactory;
use crate::routing::Router;

pub struct ListenServer {
    listener: Listener,
    manager: SessionManager,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ListenServer {
    /// Bind the configured port and prepare session bookkeeping.
    pub async fn bind(
        config: &ListenerConfig,
        session: &SessionConfig,
        registry: BackendRegistry,
        factory: Box<dyn SessionFactory>,
    ) -> Result<Self, ListenerError> {
        let listener = Listener::bind(config, session.max_connections).await?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            port = config.listen_port,
            backends = config.routing_servers.len(),
            "Server is now listening"
        );

        Ok(Self {
            listener,
            manager: SessionManager::new(config, registry, factory),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn router(&self) -> Router {
        self.manager.router().clone()
    }

    /// Serve until `shutdown` fires, then drop every session and reset client counts.
    pub async fn run(
        mut self,
        mut config_updates: mpsc::UnboundedReceiver<ListenerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut updates_open = true;
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.on_accept(stream, peer, permit),
                    Err(ListenerError::Closed) => {
                        tracing::error!(port = self.manager.port(), "Listener closed");
                        break;
                    }
                    Err(e) => tracing::error!(port = self.manager.port(), error = %e, "Listener error"),
                },
                Some(event) = self.events_rx.recv() => self.manager.handle_event(event),
                update = config_updates.recv(), if updates_open => match update {
                    Some(config) => self.manager.update_info(&config),
                    None => updates_open = false,
                },
            }
        }

        let port = self.manager.port();
        self.manager.shutdown();
        drop(self.listener);
        tracing::info!(port, "Server stopped");
    }

    fn on_accept(&mut self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let (sink, sink_rx) = ClientSink::channel();
        let id = match self.manager.accept(Some(peer), sink) {
            Ok(id) => id,
            Err(_) => return,
        };

        let io = spawn_io(id, stream, self.events_tx.clone(), sink_rx, Some(permit));
        self.manager.attach_io(id, io);
    }
}
