//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// One entry per listening port.
    pub servers: Vec<ListenerConfig>,

    /// Per-session behaviour.
    pub session: SessionConfig,

    /// Hosting-provider IP lookups.
    pub reputation: ReputationConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// A listening port and the backend pool it routes into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Port accepting player connections.
    pub listen_port: u16,

    /// Interface to bind (default: all interfaces).
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Backends eligible for sessions accepted on this port.
    #[serde(default)]
    pub routing_servers: Vec<RoutingServer>,
}

impl ListenerConfig {
    pub fn new(listen_port: u16, routing_servers: Vec<RoutingServer>) -> Self {
        Self {
            listen_port,
            bind_host: default_bind_host(),
            routing_servers,
        }
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.listen_port)
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

/// Identity of one backend game server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RoutingServer {
    /// Unique backend name; keys the shared load counters.
    pub name: String,

    /// Backend address (e.g., "10.0.0.5:7777").
    pub address: String,
}

impl RoutingServer {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Session handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Consecutive failed connects before a backend is disabled.
    pub max_failed_attempts: u32,

    /// Maximum concurrent sessions per listener (backpressure).
    pub max_connections: usize,

    /// Client packets buffered per session while the backend is not accepting them.
    /// A session that overflows the queue is closed.
    pub upstream_queue_packets: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            max_failed_attempts: 3,
            max_connections: 10_000,
            upstream_queue_packets: 1024,
        }
    }
}

/// IP reputation lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Enable lookups.
    pub enabled: bool,

    /// Lookup base URL; requests go to `{endpoint}/{ip}/{api_key}`.
    pub endpoint: String,

    /// API key appended to each lookup.
    pub api_key: String,

    /// How long a classification is reused, in seconds.
    pub cache_ttl_secs: u64,

    /// Lookup request timeout in seconds.
    pub timeout_secs: u64,

    /// Close sessions from hosting-provider addresses.
    pub reject_hosting_ips: bool,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://tools.xioax.com/networking/ip".to_string(),
            api_key: String::new(),
            cache_ttl_secs: 30 * 60,
            timeout_secs: 5,
            reject_hosting_ips: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "game_gateway=info".to_string(),
            json: false,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter listen address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}
