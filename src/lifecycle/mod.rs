//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap (bootstrap.rs):
//!     Resolve command → build environment → build server → start
//!
//! Shutdown (shutdown.rs):
//!     Stop requested → broadcast → connectors close their listeners
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Server::stop
//! ```

pub mod bootstrap;
pub mod shutdown;
pub mod signals;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

pub use bootstrap::{run, Application, Bootstrap, Bundle, Command, RunError, ServerCommand};
pub use shutdown::Shutdown;

/// Boxed error reported by managed components.
pub type ManagedError = Box<dyn std::error::Error + Send + Sync>;

/// Operation attempted in the wrong lifecycle phase. A programming error;
/// fail fast.
#[derive(Debug, Clone, Error)]
#[error("{operation} is not allowed in the {phase} phase")]
pub struct LifecycleError {
    pub operation: &'static str,
    pub phase: &'static str,
}

impl LifecycleError {
    pub(crate) fn frozen(operation: &'static str) -> Self {
        Self {
            operation,
            phase: "serving",
        }
    }
}

/// A component with an explicit start/stop lifecycle tied to the process's
/// active period.
///
/// `start` may block for the component's entire active lifetime (a listening
/// socket's accept loop does) and is not expected to return while healthy.
/// `stop` must cause a blocked `start` to return promptly and must be safe
/// to call even if `start` never ran or already failed.
#[async_trait]
pub trait Managed: Send + Sync {
    async fn start(&self) -> Result<(), ManagedError>;
    async fn stop(&self) -> Result<(), ManagedError>;
}

/// Ordered registry of managed components, populated during bootstrap.
///
/// Components start in registration order alongside the connectors and stop
/// in reverse order during the server's stop sweep.
#[derive(Clone)]
pub struct ManagedRegistry {
    inner: Arc<Mutex<Vec<(String, Arc<dyn Managed>)>>>,
    frozen: Arc<AtomicBool>,
}

impl ManagedRegistry {
    pub(crate) fn new(frozen: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            frozen,
        }
    }

    /// Register a component under a diagnostic name.
    pub fn manage(
        &self,
        name: impl Into<String>,
        component: Arc<dyn Managed>,
    ) -> Result<(), LifecycleError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(LifecycleError::frozen("managing a component"));
        }
        self.inner.lock().unwrap().push((name.into(), component));
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, Arc<dyn Managed>)> {
        self.inner.lock().unwrap().clone()
    }
}
