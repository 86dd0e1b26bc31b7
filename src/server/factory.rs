//! Server construction behind a configuration discriminator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::environment::Environment;
use crate::server::connector::ConnectorSide;
use crate::server::filter::{recovery_filter, RequestLogRegistry};
use crate::server::handler::ServerHandler;
use crate::server::{Server, ServerError};

/// Builds a [`Server`] from configuration and environment.
pub trait ServerFactory: Send + Sync {
    fn build(&self, config: &Config, environment: &mut Environment) -> Result<Server, ServerError>;
}

/// Registry mapping `server.kind` discriminators to factories.
pub struct ServerFactoryRegistry {
    factories: HashMap<String, Arc<dyn ServerFactory>>,
}

impl ServerFactoryRegistry {
    /// Register a factory under a discriminator, replacing any previous one.
    pub fn register(&mut self, kind: &str, factory: Arc<dyn ServerFactory>) {
        self.factories.insert(kind.to_string(), factory);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn ServerFactory>, ConfigError> {
        self.factories
            .get(kind)
            .cloned()
            .ok_or_else(|| ConfigError::UnsupportedServer(kind.to_string()))
    }
}

impl Default for ServerFactoryRegistry {
    fn default() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("default", Arc::new(DefaultServerFactory::default()));
        registry.register("simple", Arc::new(SimpleServerFactory::default()));
        registry
    }
}

/// Appends the request-log and panic-recovery filters, in that order, so
/// recovery always wraps the request-log stage.
fn add_default_filters(
    request_logs: &RequestLogRegistry,
    config: &Config,
    handler: &ServerHandler,
) -> Result<(), ServerError> {
    let request_log = request_logs.build(&config.server.request_log)?;
    handler.add_filter(request_log)?;
    handler.add_filter(recovery_filter())?;
    Ok(())
}

/// Separate listeners for application traffic and the admin side-channel.
#[derive(Default)]
pub struct DefaultServerFactory {
    request_logs: RequestLogRegistry,
}

impl DefaultServerFactory {
    /// Registry for custom request-log kinds.
    pub fn request_logs_mut(&mut self) -> &mut RequestLogRegistry {
        &mut self.request_logs
    }
}

impl ServerFactory for DefaultServerFactory {
    fn build(&self, config: &Config, environment: &mut Environment) -> Result<Server, ServerError> {
        add_default_filters(&self.request_logs, config, environment.handler())?;
        let mut server = Server::new(&config.server, environment);
        server.add_connectors(ConnectorSide::Application, &config.server.application_connectors);
        server.add_connectors(ConnectorSide::Admin, &config.server.admin_connectors);
        Ok(server)
    }
}

/// One listener serving both surfaces under distinct context paths.
#[derive(Default)]
pub struct SimpleServerFactory {
    request_logs: RequestLogRegistry,
}

impl SimpleServerFactory {
    /// Registry for custom request-log kinds.
    pub fn request_logs_mut(&mut self) -> &mut RequestLogRegistry {
        &mut self.request_logs
    }
}

impl ServerFactory for SimpleServerFactory {
    fn build(&self, config: &Config, environment: &mut Environment) -> Result<Server, ServerError> {
        environment
            .handler()
            .set_context_path(&config.server.application_context_path)?;
        environment
            .admin()
            .handler()
            .set_context_path(&config.server.admin_context_path)?;
        add_default_filters(&self.request_logs, config, environment.handler())?;
        let mut server = Server::new(&config.server, environment);
        server.add_connectors(ConnectorSide::Combined, std::slice::from_ref(&config.server.connector));
        Ok(server)
    }
}
