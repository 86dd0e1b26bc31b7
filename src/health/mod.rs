//! Health-check contract and registry.
//!
//! Checks are run synchronously on every `/healthcheck` request; results are
//! never cached.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

/// Outcome of one health check.
#[derive(Debug, Default)]
pub struct CheckResult {
    pub healthy: bool,
    pub message: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CheckResult {
    /// A passing result.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: None,
            cause: None,
        }
    }

    /// A passing result with a message.
    pub fn healthy_with(message: impl Into<String>) -> Self {
        Self {
            healthy: true,
            message: Some(message.into()),
            cause: None,
        }
    }

    /// A failing result with a message.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: None,
            cause: None,
        }
        .with_message(message)
    }

    /// A failing result carrying the underlying error.
    pub fn error(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            healthy: false,
            message: None,
            cause: Some(cause.into()),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A named probe run on every poll.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> CheckResult;
}

/// Registry mapping unique names to checks.
///
/// Duplicate names are last-write-wins; the replacement is logged.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Arc<RwLock<BTreeMap<String, Arc<dyn HealthCheck>>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check under a name.
    pub fn register(&self, name: impl Into<String>, check: Arc<dyn HealthCheck>) {
        let name = name.into();
        if self.checks.write().unwrap().insert(name.clone(), check).is_some() {
            tracing::warn!(name = %name, "health check replaced");
        }
    }

    /// Names of the registered checks, sorted.
    pub fn names(&self) -> Vec<String> {
        self.checks.read().unwrap().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.read().unwrap().is_empty()
    }

    /// Run every registered check, one at a time.
    pub async fn run_all(&self) -> BTreeMap<String, CheckResult> {
        let snapshot: Vec<(String, Arc<dyn HealthCheck>)> = self
            .checks
            .read()
            .unwrap()
            .iter()
            .map(|(name, check)| (name.clone(), check.clone()))
            .collect();

        let mut results = BTreeMap::new();
        for (name, check) in snapshot {
            results.insert(name, check.check().await);
        }
        results
    }
}
