//! Observability: logging initialisation and runtime level control.

pub mod logging;

pub use logging::{init_logging, LogRegistry};
