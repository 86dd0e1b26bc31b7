//! Per-run registration aggregate.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::admin::AdminEnvironment;
use crate::lifecycle::ManagedRegistry;
use crate::observability::logging::LogRegistry;
use crate::server::handler::ServerHandler;

/// The per-run aggregate exposing the registration surfaces.
///
/// Constructed once per run and mutated during bootstrap; the server
/// factory, bundles and application setup run sequentially, so the
/// registrars are single-writer until `Server::start` freezes them.
/// Registration attempted afterwards fails with
/// [`LifecycleError`](crate::lifecycle::LifecycleError).
pub struct Environment {
    name: String,
    handler: ServerHandler,
    admin: AdminEnvironment,
    lifecycle: ManagedRegistry,
    logs: Arc<LogRegistry>,
    frozen: Arc<AtomicBool>,
}

impl Environment {
    pub fn new(name: impl Into<String>, logs: Arc<LogRegistry>) -> Self {
        let frozen = Arc::new(AtomicBool::new(false));
        Self {
            name: name.into(),
            handler: ServerHandler::new(frozen.clone()),
            admin: AdminEnvironment::new(logs.clone(), frozen.clone()),
            lifecycle: ManagedRegistry::new(frozen.clone()),
            logs,
            frozen,
        }
    }

    /// Application name this run was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Application-side route registration surface.
    pub fn handler(&self) -> &ServerHandler {
        &self.handler
    }

    /// The admin side-channel.
    pub fn admin(&self) -> &AdminEnvironment {
        &self.admin
    }

    /// Registry of managed components started and stopped with the server.
    pub fn lifecycle(&self) -> &ManagedRegistry {
        &self.lifecycle
    }

    /// Runtime log-level registry.
    pub fn logs(&self) -> &Arc<LogRegistry> {
        &self.logs
    }

    pub(crate) fn frozen_flag(&self) -> Arc<AtomicBool> {
        self.frozen.clone()
    }
}
