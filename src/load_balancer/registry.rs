//! Process-wide backend registry.
//!
//! # Responsibilities
//! - Map backend names to their shared [`ServerDetails`]
//! - Hand out leases for session bookkeeping
//! - Reset counters on reconfiguration and shutdown

use std::sync::Arc;

use dashmap::DashMap;

use crate::load_balancer::details::{BackendLease, DetailsSnapshot, ServerDetails};

/// Name-keyed backend state. Clone shares the same map.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    inner: Arc<DashMap<String, Arc<ServerDetails>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServerDetails>> {
        self.inner.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Fetch the details for `name`, registering a zeroed entry if it is new.
    pub fn get_or_insert(&self, name: &str) -> Arc<ServerDetails> {
        if let Some(details) = self.get(name) {
            return details;
        }
        Arc::clone(self.inner.entry(name.to_string()).or_default().value())
    }

    /// Take one client slot on `name`.
    pub fn lease(&self, name: &str) -> BackendLease {
        BackendLease::acquire(name, self.get_or_insert(name))
    }

    /// Zero the client count for `name`.
    pub fn reset(&self, name: &str) {
        if let Some(details) = self.get(name) {
            details.reset_clients();
        }
    }

    /// Clear `disabled` and `failed_conn_attempts` for `name`.
    pub fn reset_health(&self, name: &str) {
        if let Some(details) = self.get(name) {
            details.reset_health();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All backends, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, DetailsSnapshot)> {
        let mut all: Vec<_> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
