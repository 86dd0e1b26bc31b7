//! Route registration surface handed to bundles and applications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::routing::MethodRouter;
use axum::Router;

use crate::lifecycle::LifecycleError;
use crate::server::filter::{Filter, FilterChain};

struct HandlerInner {
    context_path: String,
    routes: Vec<(String, MethodRouter)>,
    filters: FilterChain,
}

/// Registrar for one side of the server (application or admin).
///
/// Routes and filters accumulate until the server starts; registration
/// attempted afterwards fails with [`LifecycleError`]. Registering a path
/// twice replaces the earlier route.
#[derive(Clone)]
pub struct ServerHandler {
    inner: Arc<Mutex<HandlerInner>>,
    frozen: Arc<AtomicBool>,
}

impl ServerHandler {
    pub(crate) fn new(frozen: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HandlerInner {
                context_path: String::new(),
                routes: Vec::new(),
                filters: FilterChain::new(),
            })),
            frozen,
        }
    }

    /// Register a handler for the given path.
    pub fn handle(&self, path: &str, route: MethodRouter) -> Result<(), LifecycleError> {
        self.check_frozen("registering a route")?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.routes.iter_mut().find(|(p, _)| p == path) {
            tracing::warn!(path = %path, "route replaced");
            existing.1 = route;
        } else {
            inner.routes.push((path.to_string(), route));
        }
        Ok(())
    }

    /// Append a filter. Filters wrap the routes in append order: the last
    /// filter appended sees the request first.
    pub fn add_filter(&self, filter: Filter) -> Result<(), LifecycleError> {
        self.check_frozen("adding a filter")?;
        self.inner.lock().unwrap().filters.add(filter);
        Ok(())
    }

    /// Path prefix all routes are nested under.
    pub fn context_path(&self) -> String {
        self.inner.lock().unwrap().context_path.clone()
    }

    pub(crate) fn set_context_path(&self, path: &str) -> Result<(), LifecycleError> {
        self.check_frozen("changing the context path")?;
        self.inner.lock().unwrap().context_path = path.to_string();
        Ok(())
    }

    fn check_frozen(&self, operation: &'static str) -> Result<(), LifecycleError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(LifecycleError::frozen(operation));
        }
        Ok(())
    }

    /// Drain the registered routes, filters and context path. Meant to be
    /// called once, when the server starts.
    pub(crate) fn drain(&self) -> (Vec<(String, MethodRouter)>, FilterChain, String) {
        let mut inner = self.inner.lock().unwrap();
        (
            std::mem::take(&mut inner.routes),
            inner.filters.take(),
            inner.context_path.clone(),
        )
    }

    /// Assemble the registered routes into a router, applying filters and
    /// the context path.
    pub(crate) fn build_router(&self) -> Router {
        let (routes, filters, context_path) = self.drain();
        let mut router = Router::new();
        for (path, route) in routes {
            router = router.route(&path, route);
        }
        nest_under(filters.apply(router), &context_path)
    }
}

pub(crate) fn nest_under(router: Router, context_path: &str) -> Router {
    if context_path.is_empty() || context_path == "/" {
        router
    } else {
        Router::new().nest(context_path, router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn handler() -> ServerHandler {
        ServerHandler::new(Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn duplicate_paths_are_last_write_wins() {
        let handler = handler();
        handler.handle("/x", get(|| async { "one" })).unwrap();
        handler.handle("/x", get(|| async { "two" })).unwrap();
        assert_eq!(handler.inner.lock().unwrap().routes.len(), 1);
    }

    #[test]
    fn rejects_registration_after_freeze() {
        let frozen = Arc::new(AtomicBool::new(false));
        let handler = ServerHandler::new(frozen.clone());
        handler.handle("/ok", get(|| async {})).unwrap();

        frozen.store(true, Ordering::SeqCst);
        assert!(handler.handle("/late", get(|| async {})).is_err());
        assert!(handler.add_filter(Box::new(|router| router)).is_err());
        assert!(handler.set_context_path("/late").is_err());
    }

    #[test]
    fn drain_empties_the_registrar()  {
        let handler = handler();
        handler.handle("/x", get(|| async {})).unwrap();
        let (routes, _, _) = handler.drain();
        assert_eq!(routes.len(), 1);
        let (routes, _, _) = handler.drain();
        assert!(routes.is_empty());
    }
}
