//! Application bootstrap and command dispatch.
//!
//! The first process argument selects a command by exact name. No arguments,
//! or an unknown name, prints the available commands and exits successfully.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, ConfigError, ConfigurationFactory, DefaultConfigurationFactory};
use crate::environment::Environment;
use crate::lifecycle::{signals, LifecycleError};
use crate::observability::logging::init_logging;
use crate::server::factory::ServerFactoryRegistry;
use crate::server::ServerError;

/// Terminal error of a command run; becomes the process exit status.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("application setup failed: {0}")]
    Setup(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RunError {
    /// Wrap an application- or bundle-level setup failure.
    pub fn setup(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Setup(error.into())
    }
}

/// A runnable sub-command selected by the first process argument.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(
        &self,
        bootstrap: &Bootstrap,
        application: &dyn Application,
    ) -> Result<(), RunError>;
}

/// Contributes registrations (routes, health checks, tasks, managed
/// components) during the pre-start phase.
#[async_trait]
pub trait Bundle: Send + Sync {
    async fn run(&self, config: &Config, environment: &mut Environment) -> Result<(), RunError>;
}

/// The embedding application.
#[async_trait]
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    /// Register commands and bundles. Runs before command resolution.
    fn initialize(&self, _bootstrap: &mut Bootstrap) {}

    /// Application setup: register routes, health checks, tasks and managed
    /// components before the server starts.
    async fn run(&self, config: &Config, environment: &mut Environment) -> Result<(), RunError>;
}

/// Pre-run registration state: commands, bundles and factories.
///
/// The built-in `server` command is always registered.
pub struct Bootstrap {
    arguments: Vec<String>,
    commands: Vec<Arc<dyn Command>>,
    bundles: Vec<Arc<dyn Bundle>>,
    configuration_factory: Box<dyn ConfigurationFactory>,
    server_factories: ServerFactoryRegistry,
}

impl Bootstrap {
    pub fn new(arguments: Vec<String>) -> Self {
        let mut bootstrap = Self {
            arguments,
            commands: Vec::new(),
            bundles: Vec::new(),
            configuration_factory: Box::new(DefaultConfigurationFactory),
            server_factories: ServerFactoryRegistry::default(),
        };
        bootstrap.add_command(Arc::new(ServerCommand));
        bootstrap
    }

    /// Arguments remaining after the command name.
    pub fn command_arguments(&self) -> &[String] {
        if self.arguments.is_empty() {
            &[]
        } else {
            &self.arguments[1..]
        }
    }

    pub fn add_command(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    pub fn add_bundle(&mut self, bundle: Arc<dyn Bundle>) {
        self.bundles.push(bundle);
    }

    /// Replace the configuration factory.
    pub fn set_configuration_factory(&mut self, factory: Box<dyn ConfigurationFactory>) {
        self.configuration_factory = factory;
    }

    pub fn configuration_factory(&self) -> &dyn ConfigurationFactory {
        self.configuration_factory.as_ref()
    }

    /// Registry of server factories keyed by `server.kind`.
    pub fn server_factories(&self) -> &ServerFactoryRegistry {
        &self.server_factories
    }

    pub fn server_factories_mut(&mut self) -> &mut ServerFactoryRegistry {
        &mut self.server_factories
    }

    pub(crate) fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    pub(crate) fn find_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.iter().find(|c| c.name() == name).cloned()
    }

    /// Run every registered bundle against the configuration/environment.
    pub(crate) async fn run_bundles(
        &self,
        config: &Config,
        environment: &mut Environment,
    ) -> Result<(), RunError> {
        for bundle in &self.bundles {
            bundle.run(config, environment).await?;
        }
        Ok(())
    }
}

fn print_help(bootstrap: &Bootstrap) {
    println!("Available commands:");
    for command in bootstrap.commands() {
        println!("  {:<12} {}", command.name(), command.description());
    }
}

/// Execute the application with the given arguments.
pub async fn run(application: &dyn Application, arguments: &[String]) -> Result<(), RunError> {
    let mut bootstrap = Bootstrap::new(arguments.to_vec());
    application.initialize(&mut bootstrap);

    if let Some(first) = arguments.first() {
        if let Some(command) = bootstrap.find_command(first) {
            return command.run(&bootstrap, application).await;
        }
    }
    print_help(&bootstrap);
    Ok(())
}

/// The built-in command that runs the application as an HTTP server.
pub struct ServerCommand;

#[async_trait]
impl Command for ServerCommand {
    fn name(&self) -> &str {
        "server"
    }

    fn description(&self) -> &str {
        "Runs the application as an HTTP server"
    }

    async fn run(
        &self,
        bootstrap: &Bootstrap,
        application: &dyn Application,
    ) -> Result<(), RunError> {
        let config = bootstrap
            .configuration_factory()
            .build(bootstrap.command_arguments())?;
        let logs = init_logging(&config.logging)?;

        let mut environment = Environment::new(application.name(), logs);
        let factory = bootstrap.server_factories().get(&config.server.kind)?;
        let server = factory.build(&config, &mut environment)?;
        bootstrap.run_bundles(&config, &mut environment).await?;
        application.run(&config, &mut environment).await?;

        let server = Arc::new(server);
        let signal_target = server.clone();
        tokio::spawn(async move {
            signals::shutdown_signal().await;
            if let Err(error) = signal_target.stop().await {
                tracing::warn!(error = %error, "stop on signal reported errors");
            }
        });

        tracing::info!(application = application.name(), "starting server");
        server.start().await?;
        Ok(())
    }
}
