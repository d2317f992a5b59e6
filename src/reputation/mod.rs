//! IP reputation subsystem.
//!
//! # Data Flow
//! ```text
//! New session (peer IP)
//!     → client.rs check_ip
//!         → cache.rs hit (not expired) → classification
//!         → miss: GET {endpoint}/{ip}/{key} → parse → cache.rs insert
//!     → relay decides: hosting-provider IP → close session
//! ```
//!
//! # Design Decisions
//! - Classifications are cached per address for a fixed TTL (default 30 minutes)
//! - Failures are returned to the caller and never cached
//! - No automatic retries; callers decide whether to fail open

pub mod cache;
pub mod client;

pub use cache::ReputationCache;
pub use client::ReputationClient;

use thiserror::Error;

/// Errors from a reputation lookup.
#[derive(Debug, Error)]
pub enum ReputationError {
    /// The HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("Lookup unsuccessful: status '{0}'")]
    Unsuccessful(String),

    /// A success response carried no classification.
    #[error("Response missing host-ip classification")]
    MissingClassification,

    /// The configured endpoint is not a usable base URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
