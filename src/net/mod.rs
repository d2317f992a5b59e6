//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept, connection limits)
//!     → server.rs (accept loop for one port)
//!     → manager.rs (route to backend, track session)
//!     → connection.rs (socket reader/writer tasks → SessionEvent)
//!     → session.rs (SessionHandler contract)
//!     → relay.rs (frame packets, forward to backend)
//!
//! Session States:
//!     Accepted → Routed → Active → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept via semaphore prevents resource exhaustion
//! - Session state is owned by one task per listener
//! - Socket I/O runs in per-connection tasks that only emit events

pub mod connection;
pub mod listener;
pub mod manager;
pub mod relay;
pub mod server;
pub mod session;

pub use connection::{ClientSink, SessionEvent, SessionId};
pub use listener::{Listener, ListenerError};
pub use manager::SessionManager;
pub use relay::{RelayFactory, RelaySession};
pub use server::ListenServer;
pub use session::{ClientSession, SessionContext, SessionFactory, SessionHandler};
