//! Least clients selection with fail-open fallback.

use crate::load_balancer::{BackendRegistry, LoadBalancer, RoutingServer};

/// Selects the enabled backend with the fewest clients.
///
/// Ties keep the earlier backend. The first backend in the pool is taken as the
/// starting candidate even when disabled, so a non-empty pool always yields a backend;
/// any enabled backend then displaces a disabled candidate. A disabled backend never
/// displaces anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastClients;

impl LeastClients {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastClients {
    fn choose(&self, pool: &[RoutingServer], registry: &BackendRegistry) -> Option<RoutingServer> {
        // (server, client_count, disabled)
        let mut best: Option<(&RoutingServer, usize, bool)> = None;

        for server in pool {
            let details = registry.get_or_insert(&server.name);
            let count = details.client_count();
            let disabled = details.is_disabled();

            let replace = match best {
                None => true,
                Some((_, best_count, best_disabled)) => {
                    !disabled && (count < best_count || best_disabled)
                }
            };
            if replace {
                best = Some((server, count, disabled));
            }
        }

        best.map(|(server, _, _)| server.clone())
    }
}
