//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Bind every listener → Spawn servers
//!
//! Reload (startup.rs):
//!     Config file change → apply_reload → per-listener update channel
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Servers drop sessions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: a listener that cannot bind aborts startup
//! - Listeners start last (traffic only when ready)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_termination;
pub use startup::{apply_reload, report_backends, start_listeners, RunningListener};
