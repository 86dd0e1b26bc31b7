//! Request-processing filters appended to a handler's routes.

use std::collections::HashMap;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, RequestLogConfig};

/// A single filter stage: a transformation applied to the assembled router.
pub type Filter = Box<dyn FnOnce(Router) -> Router + Send>;

/// Ordered pipeline of filter stages.
///
/// Stages apply in append order, so the stage appended last wraps all the
/// earlier ones and sees the request first.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn add(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub(crate) fn take(&mut self) -> FilterChain {
        FilterChain {
            filters: std::mem::take(&mut self.filters),
        }
    }

    pub(crate) fn apply(self, router: Router) -> Router {
        self.filters
            .into_iter()
            .fold(router, |router, filter| filter(router))
    }
}

/// Filter that recovers request-handler panics into 500 responses.
pub fn recovery_filter() -> Filter {
    Box::new(|router| router.layer(CatchPanicLayer::new()))
}

/// Builds a request-log filter for a discriminator.
pub type RequestLogBuilder = fn(&RequestLogConfig) -> Result<Filter, ConfigError>;

/// Registry mapping request-log discriminators to constructors.
pub struct RequestLogRegistry {
    builders: HashMap<String, RequestLogBuilder>,
}

impl RequestLogRegistry {
    /// Register a builder under a discriminator, replacing any previous one.
    pub fn register(&mut self, kind: &str, builder: RequestLogBuilder) {
        self.builders.insert(kind.to_string(), builder);
    }

    /// Build the filter selected by the configuration.
    pub fn build(&self, config: &RequestLogConfig) -> Result<Filter, ConfigError> {
        match self.builders.get(&config.kind) {
            Some(builder) => builder(config),
            None => Err(ConfigError::UnsupportedRequestLog(config.kind.clone())),
        }
    }
}

impl Default for RequestLogRegistry {
    fn default() -> Self {
        let mut registry = Self {
            builders: HashMap::new(),
        };
        registry.register("none", |_| Ok(Box::new(|router| router)));
        registry.register("console", |_| {
            Ok(Box::new(|router| router.layer(TraceLayer::new_for_http())))
        });
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_known_kinds() {
        let registry = RequestLogRegistry::default();
        for kind in ["none", "console"] {
            let config = RequestLogConfig {
                kind: kind.to_string(),
            };
            assert!(registry.build(&config).is_ok());
        }
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let registry = RequestLogRegistry::default();
        let config = RequestLogConfig {
            kind: "syslog".to_string(),
        };
        let error = registry.build(&config).err().unwrap();
        assert!(matches!(error, ConfigError::UnsupportedRequestLog(kind) if kind == "syslog"));
    }

    #[test]
    fn stages_apply_in_append_order() {
        let mut chain = FilterChain::new();
        chain.add(Box::new(|router| router));
        chain.add(recovery_filter());
        assert_eq!(chain.len(), 2);
        // Applying consumes every stage without panicking on an empty router.
        let _ = chain.apply(Router::new());
    }
}
