//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! CLI arguments → ConfigurationFactory → loader.rs → schema.rs structs
//!                                              │
//!                                              ▼
//!                                        validation.rs (all errors collected)
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

use std::path::PathBuf;

use clap::Parser;

pub use loader::{load_config, ConfigError};
pub use schema::{Config, ConnectorConfig, LoggingConfig, RequestLogConfig, ServerConfig, TlsConfig};

/// Builds a typed [`Config`] from the arguments remaining after command
/// dispatch.
pub trait ConfigurationFactory: Send + Sync {
    fn build(&self, args: &[String]) -> Result<Config, ConfigError>;
}

#[derive(Parser)]
#[command(name = "server", about = "Runs the application as an HTTP server", long_about = None)]
struct ServerArgs {
    /// Path to a TOML configuration file.
    config: Option<PathBuf>,
}

/// Default factory: an optional positional TOML file path; built-in defaults
/// when absent.
#[derive(Debug, Default)]
pub struct DefaultConfigurationFactory;

impl ConfigurationFactory for DefaultConfigurationFactory {
    fn build(&self, args: &[String]) -> Result<Config, ConfigError> {
        let mut argv = vec!["server".to_string()];
        argv.extend(args.iter().cloned());
        let parsed =
            ServerArgs::try_parse_from(argv).map_err(|e| ConfigError::Arguments(e.to_string()))?;
        match parsed.config {
            Some(path) => load_config(&path),
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_yields_defaults() {
        let config = DefaultConfigurationFactory.build(&[]).unwrap();
        assert_eq!(config.server.kind, "default");
        assert_eq!(config.server.application_connectors[0].address, "0.0.0.0:8080");
        assert_eq!(config.server.admin_connectors[0].address, "0.0.0.0:8081");
    }

    #[test]
    fn missing_file_fails() {
        let error = DefaultConfigurationFactory
            .build(&["/nonexistent/gantry.toml".to_string()])
            .unwrap_err();
        assert!(matches!(error, ConfigError::Io(_)));
    }

    #[test]
    fn unexpected_flags_fail() {
        let error = DefaultConfigurationFactory
            .build(&["--bogus".to_string()])
            .unwrap_err();
        assert!(matches!(error, ConfigError::Arguments(_)));
    }
}
