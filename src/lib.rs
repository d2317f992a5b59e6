//! Game Connection Gateway Library
//!
//! TCP gateway that accepts player connections on configured ports, assigns each to
//! the least-loaded backend in the port's pool, and relays length-prefixed packets.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod reputation;
pub mod routing;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use lifecycle::Shutdown;
pub use net::{ListenServer, SessionManager};
pub use routing::Router;
