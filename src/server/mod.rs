//! Managed multi-connector server runtime.
//!
//! # Data Flow
//! ```text
//! Server::start:
//!     register admin builtins → freeze environment → build routers
//!     → spawn one unit per connector and managed component
//!     → block on the shared result set
//!     → first error: stop(), drain the rest off-path, return the error
//!
//! Server::stop:
//!     trigger shutdown broadcast → bounded wait for accept loops
//!     → stop managed components in reverse order, collecting failures
//! ```

pub mod connector;
pub mod factory;
pub mod filter;
pub mod handler;
pub mod tls;

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::admin::AdminEnvironment;
use crate::config::{ConfigError, ConnectorConfig, ServerConfig};
use crate::environment::Environment;
use crate::lifecycle::{LifecycleError, Managed, ManagedError, ManagedRegistry, Shutdown};
use crate::server::connector::Connector;
use crate::server::handler::ServerHandler;

pub use connector::ConnectorSide;
pub use factory::{DefaultServerFactory, ServerFactory, ServerFactoryRegistry, SimpleServerFactory};
pub use filter::{Filter, FilterChain, RequestLogRegistry};

/// Errors raised by the server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The configured address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A listener terminated abnormally.
    #[error("listener on {addr} terminated: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A managed component failed to start.
    #[error("managed component {name:?} failed: {source}")]
    Managed {
        name: String,
        #[source]
        source: ManagedError,
    },

    /// A lifecycle unit panicked before reporting a result.
    #[error("lifecycle unit panicked: {0}")]
    UnitPanic(String),

    /// Connectors still serving when the stop grace period expired.
    #[error("{} connector(s) still serving after the {:?} stop grace period: {}", .stragglers.len(), .grace, .stragglers.join(", "))]
    PartialStop {
        stragglers: Vec<String>,
        grace: Duration,
    },

    /// Managed components that failed to stop during the sweep.
    #[error("stop completed with {} error(s): {}", .errors.len(), .errors.join("; "))]
    Stop { errors: Vec<String> },
}

/// The aggregate of all connectors plus registered managed components.
///
/// Built once by a [`ServerFactory`]; `start` runs at most once; `stop` is
/// idempotent and safe to call concurrently with `start`'s failure path.
pub struct Server {
    config: ServerConfig,
    connectors: Vec<Arc<Connector>>,
    app_handler: ServerHandler,
    admin: AdminEnvironment,
    managed: ManagedRegistry,
    shutdown: Shutdown,
    frozen: Arc<AtomicBool>,
    started: AtomicBool,
    stopped: AtomicBool,
    grace: Duration,
}

impl Server {
    pub(crate) fn new(config: &ServerConfig, environment: &Environment) -> Self {
        Self {
            config: config.clone(),
            connectors: Vec::new(),
            app_handler: environment.handler().clone(),
            admin: environment.admin().clone(),
            managed: environment.lifecycle().clone(),
            shutdown: Shutdown::new(),
            frozen: environment.frozen_flag(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            grace: Duration::from_secs(config.stop_grace_secs),
        }
    }

    pub(crate) fn add_connectors(&mut self, side: ConnectorSide, configs: &[ConnectorConfig]) {
        for config in configs {
            self.connectors.push(Arc::new(Connector::new(
                side,
                config.clone(),
                self.shutdown.clone(),
                self.grace,
            )));
        }
    }

    /// The configuration this server was built from.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// `(side, address)` of every connector, in registration order.
    pub fn connector_addresses(&self) -> Vec<(&'static str, String)> {
        self.connectors
            .iter()
            .map(|c| (c.side().name(), c.address().to_string()))
            .collect()
    }

    /// Whether `stop` has run.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Start every connector and managed component concurrently and block
    /// until the first failure or an orchestrated stop.
    ///
    /// The first error wins: `stop` runs, the remaining unit results are
    /// drained off the caller's path (observed, logged, discarded), and the
    /// error returns immediately. If every unit returns `Ok`, which is only
    /// reachable through an orchestrated shutdown, `start` returns `Ok(())`.
    pub async fn start(&self) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError {
                operation: "starting the server twice",
                phase: "serving",
            }
            .into());
        }
        if self.stopped.load(Ordering::SeqCst) {
            return Err(LifecycleError {
                operation: "starting the server",
                phase: "stopped",
            }
            .into());
        }

        self.admin.register_builtins();
        self.frozen.store(true, Ordering::SeqCst);
        self.admin.log_registrations();

        let app_router = self.app_handler.build_router();
        let admin_router = self.admin.build_router();
        for connector in &self.connectors {
            let router = match connector.side() {
                ConnectorSide::Application => app_router.clone(),
                ConnectorSide::Admin => admin_router.clone(),
                ConnectorSide::Combined => app_router.clone().merge(admin_router.clone()),
            };
            connector.install_router(router);
        }

        let mut units: JoinSet<Result<(), ServerError>> = JoinSet::new();
        for connector in &self.connectors {
            let connector = connector.clone();
            units.spawn(async move { connector.run().await });
        }
        let managed = self.managed.snapshot();
        tracing::info!(
            connectors = self.connectors.len(),
            managed = managed.len(),
            "server starting"
        );
        for (name, component) in managed {
            units.spawn(async move {
                component
                    .start()
                    .await
                    .map_err(|source| ServerError::Managed { name, source })
            });
        }

        while let Some(joined) = units.join_next().await {
            let result = joined.unwrap_or_else(|err| Err(ServerError::UnitPanic(err.to_string())));
            if let Err(error) = result {
                if let Err(stop_error) = self.stop().await {
                    tracing::warn!(error = %stop_error, "stop after startup failure reported errors");
                }
                // The remaining unit results must still be observed; drain
                // them off the caller's path.
                if !units.is_empty() {
                    tokio::spawn(drain_units(units));
                }
                return Err(error);
            }
        }

        tracing::info!("server stopped cleanly");
        Ok(())
    }

    /// Close every connector and stop managed components, best effort.
    ///
    /// Idempotent; a second call is a no-op. The wait for accept loops is
    /// bounded by the configured grace period; connectors still serving at
    /// the deadline are reported as a partial stop instead of blocking
    /// indefinitely. Managed components are stopped in reverse registration
    /// order, each bounded by the same grace period, with failures collected
    /// rather than aborting the sweep.
    pub async fn stop(&self) -> Result<(), ServerError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("server stopping");
        self.shutdown.trigger();

        let deadline = tokio::time::Instant::now() + self.grace;
        let mut stragglers = Vec::new();
        loop {
            let serving: Vec<String> = self
                .connectors
                .iter()
                .filter(|c| c.is_serving())
                .map(|c| format!("{} {}", c.side().name(), c.address()))
                .collect();
            if serving.is_empty() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                stragglers = serving;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let errors = self.stop_managed().await;
        if !stragglers.is_empty() {
            if !errors.is_empty() {
                tracing::warn!(errors = ?errors, "managed components failed to stop");
            }
            return Err(ServerError::PartialStop {
                stragglers,
                grace: self.grace,
            });
        }
        if !errors.is_empty() {
            return Err(ServerError::Stop { errors });
        }
        tracing::info!("server stopped");
        Ok(())
    }

    async fn stop_managed(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, component) in self.managed.snapshot().into_iter().rev() {
            match tokio::time::timeout(self.grace, component.stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(component = %name, error = %error, "managed component failed to stop");
                    errors.push(format!("{name}: {error}"));
                }
                Err(_) => {
                    tracing::warn!(component = %name, "managed component did not stop within the grace period");
                    errors.push(format!("{name}: stop timed out"));
                }
            }
        }
        errors
    }
}

async fn drain_units(mut units: JoinSet<Result<(), ServerError>>) {
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(error = %error, "lifecycle unit reported an error during shutdown");
            }
            Err(error) => {
                tracing::warn!(error = %error, "lifecycle unit panicked during shutdown");
            }
        }
    }
}

#[async_trait]
impl Managed for Server {
    async fn start(&self) -> Result<(), ManagedError> {
        Server::start(self).await.map_err(Into::into)
    }

    async fn stop(&self) -> Result<(), ManagedError> {
        Server::stop(self).await.map_err(Into::into)
    }
}
