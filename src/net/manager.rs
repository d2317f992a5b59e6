//! Active session bookkeeping for one listener.
//!
//! # Responsibilities
//! - Assign each accepted connection a backend and a session ID
//! - Track active sessions and dispatch their socket events
//! - Apply reconfiguration without touching live sessions
//! - Tear everything down on shutdown
//!
//! # Design Decisions
//! - Owned by a single task; no locks around the session list
//! - Handler failures are logged and contained to their session
//! - Removal is a linear scan by ID (first match); fine at expected session counts

use std::net::SocketAddr;
use std::time::Instant;

use crate::config::ListenerConfig;
use crate::error::GatewayError;
use crate::load_balancer::BackendRegistry;
use crate::net::connection::{peer_ip, ClientSink, IoHandles, SessionEvent, SessionId};
use crate::net::session::{ClientSession, SessionContext, SessionFactory};
use crate::observability::metrics;
use crate::routing::Router;

/// Sessions and routing for one listening port.
pub struct SessionManager {
    router: Router,
    factory: Box<dyn SessionFactory>,
    sessions: Vec<ClientSession>,
    next_id: u64,
}

impl SessionManager {
    pub fn new(config: &ListenerConfig, registry: BackendRegistry, factory: Box<dyn SessionFactory>) -> Self {
        Self {
            router: Router::new(config.listen_port, config.routing_servers.clone(), registry),
            factory,
            sessions: Vec::new(),
            next_id: 0,
        }
    }

    pub fn port(&self) -> u16 {
        self.router.port()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> &[ClientSession] {
        &self.sessions
    }

    /// Route a new connection and start tracking it.
    pub fn accept(&mut self, peer_addr: Option<SocketAddr>, client: ClientSink) -> Result<SessionId, GatewayError> {
        let (backend, lease) = match self.router.assign() {
            Ok(assigned) => assigned,
            Err(e) => {
                tracing::error!(
                    port = self.port(),
                    peer = ?peer_addr.as_ref().map(peer_ip),
                    error = %e,
                    "Unknown backend for new client, dropping connection"
                );
                metrics::record_no_backend(self.port());
                return Err(e);
            }
        };

        let id = SessionId::new(self.next_id);
        self.next_id += 1;

        let clients = lease.details().client_count();
        match peer_addr {
            Some(addr) => tracing::info!(
                session_id = %id,
                peer = %peer_ip(&addr),
                backend = %backend.name,
                clients,
                "Client connected"
            ),
            None => tracing::info!(session_id = %id, backend = %backend.name, clients, "Unknown client connected"),
        }

        let handler = self.factory.create(SessionContext {
            id,
            peer_addr,
            backend: backend.clone(),
            lease,
            registry: self.router.registry().clone(),
            client,
        });

        self.sessions.push(ClientSession {
            id,
            peer_addr,
            backend,
            created_at: Instant::now(),
            handler,
            io: None,
        });

        metrics::record_session_opened(self.port());
        metrics::record_active_sessions(self.port(), self.sessions.len());
        Ok(id)
    }

    /// Register the socket tasks of a tracked session. Returns false for unknown IDs.
    pub fn attach_io(&mut self, id: SessionId, io: IoHandles) -> bool {
        match self.find_mut(id) {
            Some(session) => {
                session.io = Some(io);
                true
            }
            None => {
                io.abort();
                false
            }
        }
    }

    /// Dispatch one socket event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Data { id, bytes } => self.handle_data(id, &bytes),
            SessionEvent::Error { id, error } => self.handle_error(id, &error),
            SessionEvent::Closed { id } => {
                self.handle_close(id);
            }
        }
    }

    /// Hand client bytes to the session. Failures are logged; the session stays open.
    pub fn handle_data(&mut self, id: SessionId, data: &[u8]) {
        let Some(session) = self.find_mut(id) else {
            tracing::trace!(session_id = %id, "Data for unknown session ignored");
            return;
        };
        if let Err(e) = session.handler.on_data(data) {
            tracing::warn!(session_id = %id, backend = %session.backend.name, error = %e, "Session data handling failed");
        }
    }

    pub fn handle_error(&mut self, id: SessionId, error: &std::io::Error) {
        let Some(session) = self.find_mut(id) else {
            return;
        };
        tracing::warn!(session_id = %id, backend = %session.backend.name, error = %error, "Client socket error");
        session.handler.on_error(error);
    }

    /// Run session cleanup and stop tracking it. Unknown IDs are a no-op.
    ///
    /// Returns true if a session was removed.
    pub fn handle_close(&mut self, id: SessionId) -> bool {
        let Some(pos) = self.sessions.iter().position(|s| s.id == id) else {
            tracing::debug!(session_id = %id, "Close for unknown session ignored");
            return false;
        };

        self.sessions[pos].handler.on_close();
        let session = self.sessions.remove(pos);

        let clients = self
            .router
            .registry()
            .get(&session.backend.name)
            .map(|d| d.client_count())
            .unwrap_or(0);
        match session.peer_addr {
            Some(addr) => tracing::info!(
                session_id = %id,
                peer = %peer_ip(&addr),
                backend = %session.backend.name,
                clients,
                duration_ms = session.created_at.elapsed().as_millis() as u64,
                "Client disconnected"
            ),
            None => tracing::info!(session_id = %id, backend = %session.backend.name, clients, "Client with unknown IP closed"),
        }

        metrics::record_active_sessions(self.port(), self.sessions.len());
        true
    }

    /// Apply a new port and backend pool. Live sessions keep their backends.
    pub fn update_info(&mut self, config: &ListenerConfig) {
        self.router
            .update_info(config.listen_port, config.routing_servers.clone());
    }

    /// Detach and drop every session, then clear backend client counts.
    ///
    /// Handlers are dropped without `on_close`.
    pub fn shutdown(&mut self) {
        tracing::info!(port = self.port(), sessions = self.sessions.len(), "Server is now shutting down");
        for session in &mut self.sessions {
            session.detach();
        }
        self.sessions.clear();
        self.router.shutdown();
        metrics::record_active_sessions(self.port(), 0);
    }

    fn find_mut(&mut self, id: SessionId) -> Option<&mut ClientSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for session in &mut self.sessions {
            session.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::load_balancer::{BackendLease, RoutingServer};
    use crate::net::session::SessionHandler;

    type Log = Arc<Mutex<Vec<String>>>;

    struct RecordingHandler {
        id: SessionId,
        lease: Option<BackendLease>,
        log: Log,
    }

    impl Drop for RecordingHandler {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(format!("{} dropped", self.id));
        }
    }

    impl SessionHandler for RecordingHandler {
        fn on_data(&mut self, data: &[u8]) -> Result<(), GatewayError> {
            self.log.lock().unwrap().push(format!("{} data {}", self.id, data.len()));
            if data == b"bad" {
                return Err(GatewayError::UpstreamClosed(self.id));
            }
            Ok(())
        }

        fn on_error(&mut self, _error: &std::io::Error) {
            self.log.lock().unwrap().push(format!("{} error", self.id));
        }

        fn on_close(&mut self) {
            self.lease.take();
            self.log.lock().unwrap().push(format!("{} close", self.id));
        }
    }

    struct RecordingFactory {
        log: Log,
    }

    impl SessionFactory for RecordingFactory {
        fn create(&self, ctx: SessionContext) -> Box<dyn SessionHandler> {
            Box::new(RecordingHandler {
                id: ctx.id,
                lease: Some(ctx.lease),
                log: self.log.clone(),
            })
        }
    }

    fn manager(names: &[&str]) -> (SessionManager, BackendRegistry, Log) {
        let registry = BackendRegistry::new();
        let log: Log = Arc::default();
        let config = ListenerConfig::new(
            7777,
            names
                .iter()
                .map(|n| RoutingServer::new(*n, "127.0.0.1:7000"))
                .collect(),
        );
        let manager = SessionManager::new(
            &config,
            registry.clone(),
            Box::new(RecordingFactory { log: log.clone() }),
        );
        (manager, registry, log)
    }

    fn sink() -> ClientSink {
        ClientSink::channel().0
    }

    fn count(registry: &BackendRegistry, name: &str) -> usize {
        registry.get(name).unwrap().client_count()
    }

    #[test]
    fn accept_then_close_restores_count() {
        let (mut manager, registry, log) = manager(&["a"]);
        let before = count(&registry, "a");

        let id = manager.accept(None, sink()).unwrap();
        assert_eq!(count(&registry, "a"), before + 1);
        assert_eq!(manager.active_sessions(), 1);

        assert!(manager.handle_close(id));
        assert_eq!(count(&registry, "a"), before);
        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["session-0 close".to_string(), "session-0 dropped".to_string()]
        );
    }

    #[test]
    fn ids_are_monotonic_and_sessions_spread_by_load() {
        let (mut manager, registry, _log) = manager(&["a", "b"]);
        let first = manager.accept(None, sink()).unwrap();
        let second = manager.accept(None, sink()).unwrap();
        assert!(second > first);
        assert_eq!(count(&registry, "a"), 1);
        assert_eq!(count(&registry, "b"), 1);
        assert_eq!(manager.sessions()[1].backend().name, "b");
    }

    #[test]
    fn closing_unknown_id_is_a_no_op() {
        let (mut manager, registry, log) = manager(&["a"]);
        let id = manager.accept(None, sink()).unwrap();

        assert!(!manager.handle_close(SessionId::new(99)));
        assert_eq!(manager.active_sessions(), 1);
        assert_eq!(count(&registry, "a"), 1);
        assert!(log.lock().unwrap().is_empty());

        // second close of the same session is also a no-op
        assert!(manager.handle_close(id));
        assert!(!manager.handle_close(id));
        assert_eq!(count(&registry, "a"), 0);
    }

    #[test]
    fn handler_failure_keeps_session_open() {
        let (mut manager, _registry, log) = manager(&["a"]);
        let id = manager.accept(None, sink()).unwrap();

        manager.handle_data(id, b"bad");
        manager.handle_data(id, b"good");
        assert_eq!(manager.active_sessions(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["session-0 data 3".to_string(), "session-0 data 4".to_string()]
        );
    }

    #[test]
    fn events_dispatch_in_order() {
        let (mut manager, _registry, log) = manager(&["a"]);
        let id = manager.accept(None, sink()).unwrap();

        manager.handle_event(SessionEvent::Data { id, bytes: bytes::Bytes::from_static(b"xy") });
        manager.handle_event(SessionEvent::Error {
            id,
            error: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        });
        manager.handle_event(SessionEvent::Closed { id });

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "session-0 data 2".to_string(),
                "session-0 error".to_string(),
                "session-0 close".to_string(),
                "session-0 dropped".to_string()
            ]
        );
        assert_eq!(manager.active_sessions(), 0);
    }

    #[test]
    fn empty_pool_rejects_accept() {
        let (mut manager, _registry, _log) = manager(&[]);
        assert!(matches!(
            manager.accept(None, sink()),
            Err(GatewayError::NoBackendAvailable { port: 7777 })
        ));
        assert_eq!(manager.active_sessions(), 0);
    }

    #[test]
    fn update_info_keeps_sessions() {
        let (mut manager, registry, _log) = manager(&["a"]);
        let _id = manager.accept(None, sink()).unwrap();
        registry.get("a").unwrap().record_failed_attempt(1);

        let new_pool = vec![
            RoutingServer::new("a", "127.0.0.1:7000"),
            RoutingServer::new("b", "127.0.0.1:7001"),
        ];
        manager.update_info(&ListenerConfig::new(7800, new_pool));

        assert_eq!(manager.port(), 7800);
        assert_eq!(manager.active_sessions(), 1);
        assert_eq!(count(&registry, "a"), 1);
        assert!(!registry.get("a").unwrap().is_disabled());

        let next = manager.accept(None, sink()).unwrap();
        assert_eq!(manager.sessions().iter().find(|s| s.id() == next).unwrap().backend().name, "b");
    }

    #[test]
    fn shutdown_clears_sessions_without_close_callbacks() {
        let (mut manager, registry, log) = manager(&["a", "b"]);
        for _ in 0..4 {
            manager.accept(None, sink()).unwrap();
        }
        registry.get("b").unwrap().record_failed_attempt(1);

        manager.shutdown();

        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(count(&registry, "a"), 0);
        assert_eq!(count(&registry, "b"), 0);
        assert!(registry.get("b").unwrap().is_disabled());
        assert!(log.lock().unwrap().iter().all(|l| !l.ends_with("close")));
    }
}
