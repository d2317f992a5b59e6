//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, thresholds)
//! - Detect duplicate listeners and backend names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Listen port 0 is not allowed.
    ZeroPort,
    /// Two listeners share a port.
    DuplicatePort(u16),
    /// A backend has an empty name.
    EmptyBackendName { port: u16 },
    /// A pool lists the same backend name twice.
    DuplicateBackend { port: u16, name: String },
    /// A backend address is not `host:port`.
    InvalidAddress { name: String, address: String },
    /// `session.max_failed_attempts` must be at least 1.
    ZeroFailureThreshold,
    /// `session.upstream_queue_packets` must be at least 1.
    ZeroUpstreamQueue,
    /// Reputation lookups need an endpoint and key.
    ReputationIncomplete,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ZeroPort => write!(f, "listen_port must be non-zero"),
            ValidationError::DuplicatePort(port) => write!(f, "listen_port {} is used more than once", port),
            ValidationError::EmptyBackendName { port } => {
                write!(f, "backend with empty name in pool for port {}", port)
            }
            ValidationError::DuplicateBackend { port, name } => {
                write!(f, "backend '{}' listed twice in pool for port {}", name, port)
            }
            ValidationError::InvalidAddress { name, address } => {
                write!(f, "backend '{}' has invalid address '{}'", name, address)
            }
            ValidationError::ZeroFailureThreshold => {
                write!(f, "session.max_failed_attempts must be at least 1")
            }
            ValidationError::ZeroUpstreamQueue => {
                write!(f, "session.upstream_queue_packets must be at least 1")
            }
            ValidationError::ReputationIncomplete => {
                write!(f, "reputation.enabled requires endpoint and api_key")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut ports = HashSet::new();

    for listener in &config.servers {
        let port = listener.listen_port;
        if port == 0 {
            errors.push(ValidationError::ZeroPort);
        } else if !ports.insert(port) {
            errors.push(ValidationError::DuplicatePort(port));
        }

        let mut names = HashSet::new();
        for server in &listener.routing_servers {
            if server.name.trim().is_empty() {
                errors.push(ValidationError::EmptyBackendName { port });
            } else if !names.insert(server.name.as_str()) {
                errors.push(ValidationError::DuplicateBackend {
                    port,
                    name: server.name.clone(),
                });
            }
            if !is_host_port(&server.address) {
                errors.push(ValidationError::InvalidAddress {
                    name: server.name.clone(),
                    address: server.address.clone(),
                });
            }
        }
    }

    if config.session.max_failed_attempts == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if config.session.upstream_queue_packets == 0 {
        errors.push(ValidationError::ZeroUpstreamQueue);
    }

    let reputation = &config.reputation;
    if reputation.enabled && (reputation.endpoint.is_empty() || reputation.api_key.is_empty()) {
        errors.push(ValidationError::ReputationIncomplete);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a non-zero port. Hostnames are allowed.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && matches!(port.parse::<u16>(), Ok(p) if p != 0)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ListenerConfig, RoutingServer};

    fn listener(port: u16, servers: &[(&str, &str)]) -> ListenerConfig {
        ListenerConfig::new(
            port,
            servers.iter().map(|(n, a)| RoutingServer::new(*n, *a)).collect(),
        )
    }

    #[test]
    fn valid_config_passes() {
        let mut config = GatewayConfig::default();
        config.servers.push(listener(7777, &[("a", "127.0.0.1:7001"), ("b", "127.0.0.1:7002")]));
        config.servers.push(listener(7778, &[("a", "127.0.0.1:7001")]));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.servers.push(listener(0, &[]));
        config.servers.push(listener(7777, &[("a", "127.0.0.1:7001"), ("a", "nowhere")]));
        config.servers.push(listener(7777, &[("", "127.0.0.1:7003")]));
        config.session.max_failed_attempts = 0;
        config.session.upstream_queue_packets = 0;
        config.reputation.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroPort));
        assert!(errors.contains(&ValidationError::DuplicatePort(7777)));
        assert!(errors.contains(&ValidationError::DuplicateBackend { port: 7777, name: "a".into() }));
        assert!(errors.contains(&ValidationError::InvalidAddress {
            name: "a".into(),
            address: "nowhere".into()
        }));
        assert!(errors.contains(&ValidationError::EmptyBackendName { port: 7777 }));
        assert!(errors.contains(&ValidationError::ZeroFailureThreshold));
        assert!(errors.contains(&ValidationError::ZeroUpstreamQueue));
        assert!(errors.contains(&ValidationError::ReputationIncomplete));
    }

    #[test]
    fn host_port_accepts_hostnames() {
        assert!(is_host_port("world-1.internal:7777"));
        assert!(is_host_port("[::1]:7777"));
        assert!(!is_host_port("world-1.internal"));
        assert!(!is_host_port(":7777"));
        assert!(!is_host_port("host:0"));
    }
}
