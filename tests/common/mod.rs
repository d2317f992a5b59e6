//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use game_gateway::config::{GatewayConfig, ListenerConfig, RoutingServer};
use game_gateway::lifecycle::{start_listeners, RunningListener, Shutdown};
use game_gateway::load_balancer::BackendRegistry;
use game_gateway::net::RelayFactory;
use game_gateway::protocol::{Packet, PacketWriter};

/// Start a backend that echoes every byte it receives. Returns its address.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });
    addr
}

/// Start a backend that greets every connection with a packet carrying `name`,
/// then echoes.
pub async fn start_named_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let greeting = hello_packet(name);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let greeting = greeting.clone();
            tokio::spawn(async move {
                if socket.write_all(greeting.as_bytes()).await.is_err() {
                    return;
                }
                let (mut read, mut write) = socket.split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn hello_packet(name: &str) -> Packet {
    let mut writer = PacketWriter::with_type(0x01);
    writer.pack_string(name).unwrap();
    writer.finish().unwrap()
}

/// One listener on an ephemeral loopback port.
pub fn gateway_config(backends: &[(&str, SocketAddr)]) -> GatewayConfig {
    let mut listener = ListenerConfig::new(
        0,
        backends
            .iter()
            .map(|(name, addr)| RoutingServer::new(*name, addr.to_string()))
            .collect(),
    );
    listener.bind_host = "127.0.0.1".into();

    let mut config = GatewayConfig {
        servers: vec![listener],
        ..GatewayConfig::default()
    };
    config.session.connect_timeout_secs = 2;
    config
}

pub async fn start_gateway(config: &GatewayConfig) -> (Vec<RunningListener>, BackendRegistry, Shutdown) {
    let registry = BackendRegistry::new();
    let shutdown = Shutdown::new();
    let listeners = start_listeners(config, &registry, RelayFactory::new(&config.session), &shutdown)
        .await
        .unwrap();
    (listeners, registry, shutdown)
}

/// Read exactly `len` bytes, failing the test after a timeout.
pub async fn read_exact(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("timed out reading from gateway")
        .unwrap();
    buf
}

/// True once the peer has closed the stream.
pub async fn wait_for_eof(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 64];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) => return true,
            Ok(Ok(_)) => continue,
            Err(_) => return false,
        }
    }
}

/// Poll `check` until it holds or a few seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
