//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a gantry
//! application. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for a gantry application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server topology: connectors, factory kind, filters.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server factory discriminator ("default" or "simple").
    pub kind: String,

    /// Listeners serving application traffic (used by the "default" factory).
    pub application_connectors: Vec<ConnectorConfig>,

    /// Listeners serving the operational side-channel (used by the "default"
    /// factory).
    pub admin_connectors: Vec<ConnectorConfig>,

    /// The single listener used by the "simple" factory.
    pub connector: ConnectorConfig,

    /// Path prefix for application routes under the "simple" factory.
    pub application_context_path: String,

    /// Path prefix for admin routes under the "simple" factory.
    pub admin_context_path: String,

    /// Request log filter.
    pub request_log: RequestLogConfig,

    /// Grace period for stopping connectors and managed components, in
    /// seconds.
    pub stop_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            kind: "default".to_string(),
            application_connectors: vec![ConnectorConfig::new("0.0.0.0:8080")],
            admin_connectors: vec![ConnectorConfig::new("0.0.0.0:8081")],
            connector: ConnectorConfig::new("0.0.0.0:8080"),
            application_context_path: "/application".to_string(),
            admin_context_path: "/admin".to_string(),
            request_log: RequestLogConfig::default(),
            stop_grace_secs: 5,
        }
    }
}

/// One listener definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub address: String,

    /// Optional TLS material; plain transport when absent.
    pub tls: Option<TlsConfig>,
}

impl ConnectorConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            tls: None,
        }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self::new("0.0.0.0:8080")
    }
}

/// TLS material for a connector.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Request log filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Request log discriminator ("none" or "console").
    pub kind: String,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            kind: "console".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level (trace, debug, info, warn, error, off).
    pub level: String,

    /// Per-target level overrides.
    pub loggers: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            loggers: BTreeMap::new(),
        }
    }
}
