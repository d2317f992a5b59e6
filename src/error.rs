//! Crate-level error type.

use thiserror::Error;

use crate::net::connection::SessionId;
use crate::protocol::CodecError;

/// Errors surfaced by routing and session handling.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The listener's backend pool is empty.
    #[error("No backend available for listener on port {port}")]
    NoBackendAvailable { port: u16 },

    /// Packet encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The backend side of a session is gone.
    #[error("Upstream closed for {0}")]
    UpstreamClosed(SessionId),

    /// The backend is not draining client packets fast enough.
    #[error("Upstream queue full for {0}")]
    UpstreamFull(SessionId),

    /// The client side of a session is gone.
    #[error("Client closed for {0}")]
    ClientClosed(SessionId),

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
