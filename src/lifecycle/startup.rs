//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind every configured listener before any starts serving
//! - Spawn one server task per listener
//! - Fan configuration reloads out to running listeners
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal
//! - Reloads are matched to listeners by position in the config
//! - Listeners added or removed by a reload take effect on restart

use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{GatewayConfig, ListenerConfig};
use crate::lifecycle::Shutdown;
use crate::load_balancer::BackendRegistry;
use crate::net::{ListenServer, ListenerError, RelayFactory};
use crate::observability::metrics;
use crate::routing::Router;

/// Handle to a spawned listener.
#[derive(Debug)]
pub struct RunningListener {
    pub port: u16,
    pub local_addr: SocketAddr,
    pub router: Router,
    pub updates: mpsc::UnboundedSender<ListenerConfig>,
    pub task: JoinHandle<()>,
}

/// Bind every listener in `config` and spawn its server.
pub async fn start_listeners(
    config: &GatewayConfig,
    registry: &BackendRegistry,
    factory: RelayFactory,
    shutdown: &Shutdown,
) -> Result<Vec<RunningListener>, ListenerError> {
    let mut servers = Vec::with_capacity(config.servers.len());
    for listener in &config.servers {
        let server = ListenServer::bind(
            listener,
            &config.session,
            registry.clone(),
            Box::new(factory.clone()),
        )
        .await?;
        let local_addr = server.local_addr().map_err(ListenerError::Bind)?;
        servers.push((listener.listen_port, local_addr, server));
    }

    let running = servers
        .into_iter()
        .map(|(port, local_addr, server)| {
            let (updates, updates_rx) = mpsc::unbounded_channel();
            let router = server.router();
            let task = tokio::spawn(server.run(updates_rx, shutdown.subscribe()));
            RunningListener {
                port,
                local_addr,
                router,
                updates,
                task,
            }
        })
        .collect();

    Ok(running)
}

/// Push a reloaded configuration to running listeners, by position.
pub fn apply_reload(listeners: &[RunningListener], config: &GatewayConfig) {
    if listeners.len() != config.servers.len() {
        tracing::warn!(
            running = listeners.len(),
            configured = config.servers.len(),
            "Listener count changed; restart required to add or remove listeners"
        );
    }

    for (running, updated) in listeners.iter().zip(&config.servers) {
        if updated.listen_port != running.port {
            tracing::warn!(
                old_port = running.port,
                new_port = updated.listen_port,
                "Listen port changed; socket stays bound until restart"
            );
        }
        if running.updates.send(updated.clone()).is_err() {
            tracing::warn!(port = running.port, "Listener stopped, reload not applied");
        }
    }
    tracing::info!(listeners = listeners.len().min(config.servers.len()), "Configuration reloaded");
}

/// Log every known backend's load and health, and refresh its client gauge.
pub fn report_backends(registry: &BackendRegistry) {
    for (name, state) in registry.snapshot() {
        metrics::record_backend_clients(&name, state.client_count);
        tracing::info!(
            backend = %name,
            clients = state.client_count,
            disabled = state.disabled,
            failed_attempts = state.failed_conn_attempts,
            "Backend state"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingServer;

    fn config(pools: &[&[&str]]) -> GatewayConfig {
        GatewayConfig {
            servers: pools
                .iter()
                .map(|pool| {
                    let mut listener = ListenerConfig::new(
                        0,
                        pool.iter().map(|n| RoutingServer::new(*n, "127.0.0.1:1")).collect(),
                    );
                    listener.bind_host = "127.0.0.1".into();
                    listener
                })
                .collect(),
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn starts_every_listener_and_stops_on_shutdown() {
        let config = config(&[&["a"], &["b", "c"]]);
        let registry = BackendRegistry::new();
        let shutdown = Shutdown::new();

        let running = start_listeners(&config, &registry, RelayFactory::new(&config.session), &shutdown)
            .await
            .unwrap();
        assert_eq!(running.len(), 2);
        assert_ne!(running[0].local_addr.port(), 0);
        assert_eq!(registry.len(), 3);

        shutdown.trigger();
        for listener in running {
            listener.task.await.unwrap();
        }
    }

    #[test]
    fn reporting_backends_does_not_change_state() {
        let registry = BackendRegistry::new();
        let _lease = registry.lease("a");
        registry.get_or_insert("b").record_failed_attempt(1);

        report_backends(&registry);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].1.client_count, 1);
        assert!(snapshot[1].1.disabled);
    }

    #[tokio::test]
    async fn reload_updates_router_pool() {
        let initial = config(&[&["a"]]);
        let registry = BackendRegistry::new();
        let shutdown = Shutdown::new();
        let running = start_listeners(&initial, &registry, RelayFactory::new(&initial.session), &shutdown)
            .await
            .unwrap();

        let reloaded = config(&[&["a", "b"], &["ignored"]]);
        apply_reload(&running, &reloaded);

        let router = running[0].router.clone();
        let mut names = Vec::new();
        for _ in 0..50 {
            names = router.pool().into_iter().map(|s| s.name).collect::<Vec<_>>();
            if names.len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(names, vec!["a", "b"]);
        assert!(registry.get("ignored").is_none());

        shutdown.trigger();
        for listener in running {
            listener.task.await.unwrap();
        }
    }
}
