//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! New inbound session
//!     → routing::Router (current pool for this listener)
//!     → least_clients.rs (pick backend with fewest clients, fail open)
//!     → registry.rs (shared ServerDetails by backend name)
//!     → details.rs (BackendLease increments client_count, decrements on drop)
//! ```
//!
//! # Design Decisions
//! - Policies are stateless; the registry owns all counters
//! - Registry is process-wide and shared by every listener using a backend
//! - Counters are atomics so listeners on different tasks need no locks
//! - Disabled backends are skipped unless nothing else is available

pub mod details;
pub mod least_clients;
pub mod registry;

pub use crate::config::RoutingServer;
pub use details::{BackendLease, DetailsSnapshot, ServerDetails};
pub use least_clients::LeastClients;
pub use registry::BackendRegistry;

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick a backend from `pool`, or `None` when the pool is empty.
    fn choose(&self, pool: &[RoutingServer], registry: &BackendRegistry) -> Option<RoutingServer>;
}
