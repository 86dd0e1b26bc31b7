//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::TcpListener;
use std::time::Duration;

use gantry::config::{Config, ConnectorConfig};
use gantry::observability::logging::LogRegistry;
use gantry::server::{Server, ServerFactory, ServerFactoryRegistry};
use gantry::Environment;
use tracing_subscriber::filter::LevelFilter;

/// Reserve a free loopback port.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn loopback(port: u16) -> String {
    format!("127.0.0.1:{port}")
}

/// Config with one application and one admin connector on free loopback
/// ports. Returns `(config, app_port, admin_port)`.
pub fn default_config() -> (Config, u16, u16) {
    let app_port = free_port();
    let admin_port = free_port();
    let mut config = Config::default();
    config.server.application_connectors = vec![ConnectorConfig::new(&loopback(app_port))];
    config.server.admin_connectors = vec![ConnectorConfig::new(&loopback(admin_port))];
    config.server.stop_grace_secs = 2;
    (config, app_port, admin_port)
}

pub fn environment() -> Environment {
    Environment::new("test", LogRegistry::detached(LevelFilter::INFO))
}

/// Build a server for the config through the factory registry.
pub fn build_server(config: &Config, environment: &mut Environment) -> Server {
    ServerFactoryRegistry::default()
        .get(&config.server.kind)
        .unwrap()
        .build(config, environment)
        .unwrap()
}

/// Poll a URL until it answers or give up.
pub async fn wait_until_serving(client: &reqwest::Client, url: &str) {
    for _ in 0..100 {
        if client.get(url).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server did not come up at {url}");
}
