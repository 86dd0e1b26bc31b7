//! gantry: an application-lifecycle runtime for web services.
//!
//! gantry bootstraps an embedding application, dispatches sub-commands,
//! builds a managed runtime environment, and brings up one or more network
//! listeners (application traffic plus an operational side-channel) with
//! coordinated startup and shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!   run(app, args)
//!        │ exact-match dispatch; unknown command → help, success
//!        ▼
//!   ┌───────────┐      server      ┌───────────────────────────────┐
//!   │ Bootstrap │ ───────────────▶ │ config → Environment          │
//!   └───────────┘                  │   → ServerFactory (by kind)   │
//!                                  │   → bundles → application.run │
//!                                  └──────────────┬────────────────┘
//!                                                 ▼
//!                    ┌────────────────────────────────────────────┐
//!                    │ Server::start: one unit per connector and  │
//!                    │ managed component; first error wins, the   │
//!                    │ rest are drained; stop() is best effort    │
//!                    └──────────┬──────────────────┬──────────────┘
//!                               ▼                  ▼
//!                      application connectors   admin connector
//!                      (request log + panic     /ping /runtime
//!                       recovery filters)       /healthcheck /tasks/<name>
//! ```
//!
//! The admin side-channel comes up with the server and serves an HTML menu,
//! `/ping`, `/runtime`, `/healthcheck` and `/tasks/<name>`.

// Core subsystems
pub mod config;
pub mod server;

// Operational surface
pub mod admin;
pub mod health;

// Cross-cutting concerns
pub mod environment;
pub mod lifecycle;
pub mod observability;

pub use admin::tasks::{DispatchError, Task, TaskParams};
pub use admin::AdminEnvironment;
pub use config::{Config, ConfigurationFactory};
pub use environment::Environment;
pub use health::{CheckResult, HealthCheck, HealthRegistry};
pub use lifecycle::{
    run, Application, Bootstrap, Bundle, Command, LifecycleError, Managed, ManagedError, RunError,
    ServerCommand, Shutdown,
};
pub use server::{Server, ServerError};
