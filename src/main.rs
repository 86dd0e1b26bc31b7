//! Default gantry binary: a minimal embedding application.

use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use gantry::{Application, CheckResult, Config, Environment, HealthCheck, RunError};

struct HelloApplication;

struct SelfCheck;

#[async_trait]
impl HealthCheck for SelfCheck {
    async fn check(&self) -> CheckResult {
        CheckResult::healthy()
    }
}

#[async_trait]
impl Application for HelloApplication {
    fn name(&self) -> &str {
        "hello"
    }

    async fn run(&self, _config: &Config, environment: &mut Environment) -> Result<(), RunError> {
        environment
            .handler()
            .handle("/", get(|| async { "Hello, world!\n" }))?;
        environment.admin().health().register("self", Arc::new(SelfCheck));
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let arguments: Vec<String> = std::env::args().skip(1).collect();
    if let Err(error) = gantry::run(&HelloApplication, &arguments).await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
