//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::Config;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("invalid arguments: {0}")]
    Arguments(String),

    #[error("{0:?} is not a valid socket address")]
    InvalidAddress(String),

    #[error("TLS material unavailable: {0}")]
    Tls(String),

    #[error("unsupported log level {0:?}")]
    UnsupportedLevel(String),

    #[error("unsupported server kind {0:?}")]
    UnsupportedServer(String),

    #[error("unsupported request log {0:?}")]
    UnsupportedRequestLog(String),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
kind = "simple"

[server.connector]
address = "127.0.0.1:9090"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.kind, "simple");
        assert_eq!(config.server.connector.address, "127.0.0.1:9090");
        assert_eq!(config.logging.level, "debug");
        // Unspecified sections fall back to defaults.
        assert_eq!(config.server.stop_grace_secs, 5);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
stop_grace_secs = 0
"#
        )
        .unwrap();

        let error = load_config(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let error = load_config(Path::new("/nonexistent/gantry.toml")).unwrap_err();
        assert!(matches!(error, ConfigError::Io(_)));
    }
}
