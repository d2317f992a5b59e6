//! Backend assignment for one listener.
//!
//! # Responsibilities
//! - Hold the listener's current port and backend pool
//! - Choose a backend for each new session and take its lease
//! - Apply reconfiguration and shutdown resets to the shared registry
//!
//! # Design Decisions
//! - Pool swaps are atomic (`ArcSwap`); selection never blocks on reconfiguration
//! - Reconfiguration re-enables backends but keeps live client counts
//! - Shutdown clears client counts but keeps health state
//! - An empty pool is an explicit error, never a silent default

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::GatewayError;
use crate::load_balancer::{BackendLease, BackendRegistry, LeastClients, LoadBalancer, RoutingServer};

#[derive(Debug)]
struct RouterState {
    port: u16,
    pool: Vec<RoutingServer>,
}

/// Routes new sessions on one listener to backends. Clone shares the same state.
#[derive(Debug, Clone)]
pub struct Router {
    state: Arc<ArcSwap<RouterState>>,
    registry: BackendRegistry,
    policy: Arc<dyn LoadBalancer>,
}

impl Router {
    /// Create a router using the least-clients policy.
    pub fn new(port: u16, pool: Vec<RoutingServer>, registry: BackendRegistry) -> Self {
        Self::with_policy(port, pool, registry, Arc::new(LeastClients::new()))
    }

    /// Create a router with a custom selection policy.
    ///
    /// Every backend in `pool` gets a registry entry.
    pub fn with_policy(
        port: u16,
        pool: Vec<RoutingServer>,
        registry: BackendRegistry,
        policy: Arc<dyn LoadBalancer>,
    ) -> Self {
        for server in &pool {
            registry.get_or_insert(&server.name);
        }
        Self {
            state: Arc::new(ArcSwap::from_pointee(RouterState { port, pool })),
            registry,
            policy,
        }
    }

    pub fn port(&self) -> u16 {
        self.state.load().port
    }

    /// Current backend pool.
    pub fn pool(&self) -> Vec<RoutingServer> {
        self.state.load().pool.clone()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Pick a backend from the current pool without taking a slot.
    pub fn choose(&self) -> Option<RoutingServer> {
        let state = self.state.load();
        self.policy.choose(&state.pool, &self.registry)
    }

    /// Pick a backend and take one client slot on it.
    pub fn assign(&self) -> Result<(RoutingServer, BackendLease), GatewayError> {
        let server = self.choose().ok_or_else(|| GatewayError::NoBackendAvailable {
            port: self.port(),
        })?;
        let lease = self.registry.lease(&server.name);
        Ok((server, lease))
    }

    /// Replace port and pool. Re-enables every backend in the new pool and clears its
    /// failed attempts; client counts are left alone so live sessions stay counted.
    pub fn update_info(&self, port: u16, pool: Vec<RoutingServer>) {
        for server in &pool {
            self.registry.get_or_insert(&server.name).reset_health();
        }
        tracing::info!(
            port,
            backends = pool.len(),
            "Routing pool updated"
        );
        self.state.store(Arc::new(RouterState { port, pool }));
    }

    /// Zero client counts for every backend in the current pool. Health state is kept.
    pub fn shutdown(&self) {
        for server in &self.state.load().pool {
            self.registry.reset(&server.name);
        }
    }
}
