//! Per-backend load and health counters.
//!
//! # Responsibilities
//! - Track clients currently assigned to a backend
//! - Track failed connection attempts and the disabled flag
//! - Release a session's slot automatically via [`BackendLease`]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Mutable state for one backend, shared by every listener that routes to it.
#[derive(Debug, Default)]
pub struct ServerDetails {
    client_count: AtomicUsize,
    disabled: AtomicBool,
    failed_conn_attempts: AtomicU32,
}

/// Point-in-time copy of [`ServerDetails`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailsSnapshot {
    pub client_count: usize,
    pub disabled: bool,
    pub failed_conn_attempts: u32,
}

impl ServerDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn failed_conn_attempts(&self) -> u32 {
        self.failed_conn_attempts.load(Ordering::Relaxed)
    }

    /// Returns the new count.
    pub fn increment_clients(&self) -> usize {
        self.client_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Saturates at zero: a shutdown may have cleared the count already.
    pub fn decrement_clients(&self) -> usize {
        let prev = self
            .client_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_sub(1)))
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    pub fn reset_clients(&self) {
        self.client_count.store(0, Ordering::Relaxed);
    }

    /// Re-enable the backend and forget past connection failures.
    pub fn reset_health(&self) {
        self.disabled.store(false, Ordering::Relaxed);
        self.failed_conn_attempts.store(0, Ordering::Relaxed);
    }

    /// Count a failed connect; disables the backend once `threshold` is reached.
    /// Returns true if this call disabled it.
    pub fn record_failed_attempt(&self, threshold: u32) -> bool {
        let attempts = self.failed_conn_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempts >= threshold {
            return !self.disabled.swap(true, Ordering::Relaxed);
        }
        false
    }

    pub fn record_successful_connect(&self) {
        self.failed_conn_attempts.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DetailsSnapshot {
        DetailsSnapshot {
            client_count: self.client_count(),
            disabled: self.is_disabled(),
            failed_conn_attempts: self.failed_conn_attempts(),
        }
    }
}

/// A session's hold on one backend slot.
///
/// Creating a lease increments the backend's client count; dropping it decrements.
#[derive(Debug)]
pub struct BackendLease {
    name: String,
    details: Arc<ServerDetails>,
}

impl BackendLease {
    pub fn acquire(name: impl Into<String>, details: Arc<ServerDetails>) -> Self {
        let name = name.into();
        let count = details.increment_clients();
        metrics::record_backend_clients(&name, count);
        Self { name, details }
    }

    /// Backend name this lease counts against.
    pub fn backend_name(&self) -> &str {
        &self.name
    }

    pub fn details(&self) -> &Arc<ServerDetails> {
        &self.details
    }
}

impl Drop for BackendLease {
    fn drop(&mut self) {
        let count = self.details.decrement_clients();
        metrics::record_backend_clients(&self.name, count);
        tracing::trace!(backend = %self.name, clients = count, "Backend lease released");
    }
}
