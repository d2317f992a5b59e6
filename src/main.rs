//! Game Connection Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!     Player                ┌──────────────────────────────────────────────┐
//!     ─────────────────────▶│ net::listener → net::server → net::manager   │
//!                           │                      │             │         │
//!                           │                      ▼             ▼         │
//!                           │            routing::router   net::relay      │
//!                           │                      │        (protocol      │
//!                           │                      ▼         framer)       │
//!                           │        load_balancer::least_clients │        │
//!                           │                                     ▼        │
//!     ◀─────────────────────│◀──────────────────────────── backend socket ─┼──── Game server
//!                           │                                              │
//!                           │  config (TOML + watcher) · reputation ·      │
//!                           │  observability · lifecycle                   │
//!                           └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use game_gateway::config::{load_config, watcher::ConfigWatcher};
use game_gateway::lifecycle::{apply_reload, report_backends, start_listeners, wait_for_termination, Shutdown};
use game_gateway::load_balancer::BackendRegistry;
use game_gateway::net::RelayFactory;
use game_gateway::observability::{logging, metrics};
use game_gateway::reputation::ReputationClient;

#[derive(Parser)]
#[command(name = "game-gateway")]
#[command(about = "Connection gateway for game servers", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Emit logs as JSON regardless of configuration.
    #[arg(long)]
    json_logs: bool,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if cli.json_logs {
        config.logging.json = true;
    }
    logging::init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        listeners = config.servers.len(),
        "game-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let factory = if config.reputation.enabled {
        let client = ReputationClient::new(&config.reputation)?;
        RelayFactory::with_reputation(&config.session, client, config.reputation.reject_hosting_ips)
    } else {
        RelayFactory::new(&config.session)
    };

    let registry = BackendRegistry::new();
    let shutdown = Shutdown::new();
    let listeners = start_listeners(&config, &registry, factory, &shutdown).await?;

    let (_watcher, mut reloads) = if cli.no_watch {
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (None, rx)
    } else {
        let (watcher, rx) = ConfigWatcher::new(&cli.config);
        (Some(watcher.run()?), rx)
    };

    let termination = wait_for_termination();
    tokio::pin!(termination);
    loop {
        tokio::select! {
            result = &mut termination => {
                result?;
                break;
            }
            Some(new_config) = reloads.recv() => {
                apply_reload(&listeners, &new_config);
                report_backends(&registry);
            }
        }
    }

    report_backends(&registry);
    shutdown.trigger();
    for listener in listeners {
        if let Err(e) = listener.task.await {
            tracing::error!(port = listener.port, error = %e, "Listener task failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
