//! Time-limited classification cache.
//!
//! Expired entries are dropped when looked up, and swept in bulk on insert once the
//! map has doubled since the last sweep.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// One cached classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedClassification {
    /// The address belongs to a hosting provider.
    pub is_host_ip: bool,
    /// Reuse until this instant.
    pub expires: Instant,
}

/// A thread-safe cache of address classifications. Clone shares the same map.
#[derive(Debug, Clone)]
pub struct ReputationCache {
    inner: Arc<DashMap<String, CachedClassification>>,
    ttl: Duration,
    min_sweep: usize,
    next_sweep: Arc<AtomicUsize>,
}

/// Entries held before the first bulk sweep.
const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

impl ReputationCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_sweep_threshold(ttl, DEFAULT_SWEEP_THRESHOLD)
    }

    /// Cache that sweeps expired entries once it holds `threshold` entries.
    pub fn with_sweep_threshold(ttl: Duration, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
            min_sweep: threshold,
            next_sweep: Arc::new(AtomicUsize::new(threshold)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached classification for `ip` if still valid at `now`. Expired entries are removed.
    pub fn get(&self, ip: &str, now: Instant) -> Option<bool> {
        let entry = self.inner.get(ip).map(|r| *r.value())?;
        if entry.expires > now {
            return Some(entry.is_host_ip);
        }
        self.inner.remove_if(ip, |_, v| v.expires <= now);
        None
    }

    /// Cache a classification observed at `now`.
    pub fn insert(&self, ip: &str, is_host_ip: bool, now: Instant) {
        if self.inner.len() >= self.next_sweep.load(Ordering::Relaxed) {
            self.purge_expired(now);
            let live = self.inner.len();
            self.next_sweep
                .store((live * 2).max(self.min_sweep), Ordering::Relaxed);
            tracing::debug!(live, "Swept expired reputation entries");
        }
        self.inner.insert(
            ip.to_string(),
            CachedClassification {
                is_host_ip,
                expires: now + self.ttl,
            },
        );
    }

    /// Drop every entry expired at `now`.
    pub fn purge_expired(&self, now: Instant) {
        self.inner.retain(|_, v| v.expires > now);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
