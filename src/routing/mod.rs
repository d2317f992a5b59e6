//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection
//!     → router.rs (current pool for the listener)
//!     → load_balancer (policy picks backend, registry lease taken)
//!     → Return: (RoutingServer, BackendLease) or NoBackendAvailable
//!
//! Reconfiguration:
//!     ListenerConfig
//!     → Router::update_info (swap port + pool, re-enable backends)
//! ```
//!
//! # Design Decisions
//! - One Router per listener; backend counters shared through the registry
//! - Deterministic: same counters always pick the same backend
//! - Explicit NoBackendAvailable rather than silent default

pub mod router;

pub use router::Router;
