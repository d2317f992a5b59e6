//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (session_id, backend, port) on every session event
//! - Metrics are cheap (atomic increments); without an installed recorder they are no-ops
//! - `RUST_LOG` always wins over the configured filter

pub mod logging;
pub mod metrics;
