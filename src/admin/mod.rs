//! Operational side-channel environment.
//!
//! Owns the admin-side handler registration, the health-check registry and
//! the operator-task registry, and registers the fixed built-in endpoints
//! exactly once per environment.

pub mod handlers;
pub mod tasks;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::health::HealthRegistry;
use crate::lifecycle::LifecycleError;
use crate::observability::logging::LogRegistry;
use crate::server::handler::{nest_under, ServerHandler};
use self::tasks::{GcTask, LogLevelTask, Task};

pub(crate) type TaskMap = Arc<RwLock<BTreeMap<String, Arc<dyn Task>>>>;

/// State injected into the built-in admin handlers.
#[derive(Clone)]
pub(crate) struct AdminState {
    pub(crate) health: HealthRegistry,
    pub(crate) tasks: TaskMap,
    pub(crate) context_path: String,
}

/// The admin side of an [`Environment`](crate::Environment).
#[derive(Clone)]
pub struct AdminEnvironment {
    handler: ServerHandler,
    health: HealthRegistry,
    tasks: TaskMap,
    builtins: Arc<Mutex<Option<Router>>>,
    builtins_registered: Arc<AtomicBool>,
    frozen: Arc<AtomicBool>,
}

impl AdminEnvironment {
    pub(crate) fn new(logs: Arc<LogRegistry>, frozen: Arc<AtomicBool>) -> Self {
        let env = Self {
            handler: ServerHandler::new(frozen.clone()),
            health: HealthRegistry::new(),
            tasks: Arc::new(RwLock::new(BTreeMap::new())),
            builtins: Arc::new(Mutex::new(None)),
            builtins_registered: Arc::new(AtomicBool::new(false)),
            frozen,
        };
        env.insert_task(Arc::new(GcTask));
        env.insert_task(Arc::new(LogLevelTask::new(logs)));
        env
    }

    /// Extra admin-side route registration surface.
    pub fn handler(&self) -> &ServerHandler {
        &self.handler
    }

    /// The health-check registry polled by `/healthcheck`.
    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Register a task under `/tasks/<name>`.
    ///
    /// Must happen before the admin connector starts serving; duplicate
    /// names are last-write-wins.
    pub fn add_task(&self, task: Arc<dyn Task>) -> Result<(), LifecycleError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(LifecycleError::frozen("registering a task"));
        }
        self.insert_task(task);
        Ok(())
    }

    fn insert_task(&self, task: Arc<dyn Task>) {
        let name = task.name().to_string();
        if self.tasks.write().unwrap().insert(name.clone(), task).is_some() {
            tracing::warn!(task = %name, "task replaced");
        }
    }

    /// Names of the registered tasks, sorted.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.read().unwrap().keys().cloned().collect()
    }

    /// Register the fixed built-in endpoints. Idempotent; only the first
    /// call has an effect.
    pub fn register_builtins(&self) {
        if self.builtins_registered.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = AdminState {
            health: self.health.clone(),
            tasks: self.tasks.clone(),
            context_path: self.handler.context_path(),
        };
        let router = Router::new()
            .route("/", get(handlers::menu))
            .route("/ping", get(handlers::ping))
            .route("/runtime", get(handlers::runtime_stats))
            .route("/healthcheck", get(handlers::healthcheck))
            .route("/tasks/{name}", post(handlers::dispatch_task))
            .with_state(state);
        *self.builtins.lock().unwrap() = Some(router);
    }

    /// Log the registered tasks and health checks. Diagnostic only.
    pub(crate) fn log_registrations(&self) {
        let context_path = self.handler.context_path();
        for name in self.task_names() {
            tracing::info!(method = "POST", path = %format!("{context_path}/tasks/{name}"), "task registered");
        }
        let checks = self.health.names();
        if checks.is_empty() {
            tracing::warn!("THIS APPLICATION HAS NO HEALTHCHECKS.");
        } else {
            tracing::debug!(checks = ?checks, "health checks registered");
        }
    }

    /// Assemble the admin router: builtins, extra registered routes, the
    /// no-store cache policy, and the context path.
    pub(crate) fn build_router(&self) -> Router {
        self.register_builtins();
        let builtin = self.builtins.lock().unwrap().take().unwrap_or_default();
        let (routes, filters, context_path) = self.handler.drain();

        let mut router = builtin;
        for (path, route) in routes {
            router = router.route(&path, route);
        }
        router = filters.apply(router);
        router = router.layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("must-revalidate,no-cache,no-store"),
        ));
        nest_under(router, &context_path)
    }
}
