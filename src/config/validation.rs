//! Configuration validation.
//!
//! Semantic validation on top of serde's syntactic checks. Every violation
//! is collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::{Config, ConnectorConfig};

/// A single validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(errors: &mut Vec<ValidationError>, field: impl Into<String>, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.into(),
        message: message.into(),
    });
}

/// Validate the full configuration, returning all violations.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.server.kind.as_str() {
        "" => error(&mut errors, "server.kind", "must not be empty"),
        "default" => {
            if config.server.application_connectors.is_empty() {
                error(
                    &mut errors,
                    "server.application_connectors",
                    "at least one connector is required",
                );
            }
            if config.server.admin_connectors.is_empty() {
                error(
                    &mut errors,
                    "server.admin_connectors",
                    "at least one connector is required",
                );
            }
            for (i, connector) in config.server.application_connectors.iter().enumerate() {
                validate_connector(
                    format!("server.application_connectors[{i}]"),
                    connector,
                    &mut errors,
                );
            }
            for (i, connector) in config.server.admin_connectors.iter().enumerate() {
                validate_connector(
                    format!("server.admin_connectors[{i}]"),
                    connector,
                    &mut errors,
                );
            }
        }
        "simple" => {
            validate_connector("server.connector".to_string(), &config.server.connector, &mut errors);
            if !config.server.application_context_path.starts_with('/') {
                error(
                    &mut errors,
                    "server.application_context_path",
                    "must start with '/'",
                );
            }
            if !config.server.admin_context_path.starts_with('/') {
                error(&mut errors, "server.admin_context_path", "must start with '/'");
            }
        }
        // Other kinds are resolved against the factory registry at build time.
        _ => {}
    }

    if config.server.stop_grace_secs == 0 {
        error(&mut errors, "server.stop_grace_secs", "must be greater than zero");
    }

    if config.logging.level.parse::<tracing_subscriber::filter::LevelFilter>().is_err() {
        error(
            &mut errors,
            "logging.level",
            format!("{:?} is not a log level", config.logging.level),
        );
    }
    for (target, level) in &config.logging.loggers {
        if level.parse::<tracing_subscriber::filter::LevelFilter>().is_err() {
            error(
                &mut errors,
                format!("logging.loggers.{target}"),
                format!("{level:?} is not a log level"),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_connector(field: String, connector: &ConnectorConfig, errors: &mut Vec<ValidationError>) {
    if connector.address.parse::<SocketAddr>().is_err() {
        error(
            errors,
            format!("{field}.address"),
            format!("{:?} is not a valid socket address", connector.address),
        );
    }
    if let Some(tls) = &connector.tls {
        if tls.cert_path.is_empty() {
            error(errors, format!("{field}.tls.cert_path"), "must not be empty");
        }
        if tls.key_path.is_empty() {
            error(errors, format!("{field}.tls.key_path"), "must not be empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ConnectorConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = Config::default();
        config.server.application_connectors = vec![ConnectorConfig::new("not-an-address")];
        config.server.stop_grace_secs = 0;
        config.logging.level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field.contains("application_connectors")));
        assert!(errors.iter().any(|e| e.field == "server.stop_grace_secs"));
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn simple_kind_checks_context_paths() {
        let mut config = Config::default();
        config.server.kind = "simple".to_string();
        config.server.admin_context_path = "admin".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.admin_context_path");
    }
}
