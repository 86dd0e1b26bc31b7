//! Operator-triggered administrative actions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::admin::handlers::resident_memory;
use crate::observability::logging::{level_name, parse_level, LogRegistry};

/// Query/body input handed to a task invocation.
#[derive(Debug, Default)]
pub struct TaskParams {
    query: Vec<(String, String)>,
    body: String,
}

impl TaskParams {
    pub fn new(query: Vec<(String, String)>, body: String) -> Self {
        Self { query, body }
    }

    /// First value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a key, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Errors contained to a single admin request; rendered as HTTP responses
/// and never propagated to the process level.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("level {0:?} is not supported")]
    UnsupportedLevel(String),

    #[error("{0}")]
    InvalidParameter(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::UnknownTask(_) => StatusCode::NOT_FOUND,
            DispatchError::UnsupportedLevel(_) | DispatchError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        (status, format!("{self}\n")).into_response()
    }
}

/// An operator-triggered synchronous administrative action, invoked per
/// request to its registered path on the admin surface.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique name; the task is reachable at `/tasks/<name>`.
    fn name(&self) -> &str;

    async fn execute(&self, params: &TaskParams) -> Result<String, DispatchError>;
}

/// Memory-reclamation probe.
///
/// There is no collector to kick here; the task keeps its historical route
/// and markers and reports the fresh resident-set size between them.
pub struct GcTask;

#[async_trait]
impl Task for GcTask {
    fn name(&self) -> &str {
        "gc"
    }

    async fn execute(&self, _params: &TaskParams) -> Result<String, DispatchError> {
        let mut output = String::from("Running GC...\n");
        if let Some(resident) = resident_memory() {
            output.push_str(&format!("Resident: {resident} bytes\n"));
        }
        output.push_str("Done!\n");
        Ok(output)
    }
}

/// Gets and sets logger levels: `?logger=<target>&level=<level>`.
///
/// Multiple `logger` parameters are allowed; at most one `level`. Without a
/// `level` the current levels are printed unchanged.
pub struct LogLevelTask {
    logs: Arc<LogRegistry>,
}

impl LogLevelTask {
    pub fn new(logs: Arc<LogRegistry>) -> Self {
        Self { logs }
    }
}

#[async_trait]
impl Task for LogLevelTask {
    fn name(&self) -> &str {
        "log"
    }

    async fn execute(&self, params: &TaskParams) -> Result<String, DispatchError> {
        let loggers = params.get_all("logger");
        if loggers.is_empty() {
            return Ok(String::new());
        }
        for target in &loggers {
            if !valid_target(target) {
                return Err(DispatchError::InvalidParameter(format!(
                    "invalid logger name {target:?}"
                )));
            }
        }
        if let Some(level) = params.get("level") {
            let parsed = parse_level(level)
                .ok_or_else(|| DispatchError::UnsupportedLevel(level.to_string()))?;
            for target in &loggers {
                self.logs.set_level(target, parsed);
            }
        }
        let mut output = String::new();
        for target in &loggers {
            output.push_str(&format!("{target}: {}\n", level_name(self.logs.level(target))));
        }
        Ok(output)
    }
}

fn valid_target(target: &str) -> bool {
    !target.is_empty()
        && target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    fn params(query: &[(&str, &str)]) -> TaskParams {
        TaskParams::new(
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            String::new(),
        )
    }

    #[tokio::test]
    async fn gc_task_prints_markers_in_order() {
        let output = GcTask.execute(&TaskParams::default()).await.unwrap();
        let running = output.find("Running").unwrap();
        let done = output.find("Done!").unwrap();
        assert!(running < done);
    }

    #[tokio::test]
    async fn log_task_sets_and_reports_levels() {
        let logs = LogRegistry::detached(LevelFilter::INFO);
        let task = LogLevelTask::new(logs.clone());

        let output = task
            .execute(&params(&[("logger", "gantry::server"), ("level", "debug")]))
            .await
            .unwrap();
        assert_eq!(output, "gantry::server: DEBUG\n");
        assert_eq!(logs.level("gantry::server"), LevelFilter::DEBUG);
    }

    #[tokio::test]
    async fn log_task_rejects_unsupported_levels() {
        let task = LogLevelTask::new(LogRegistry::detached(LevelFilter::INFO));
        let error = task
            .execute(&params(&[("logger", "gantry"), ("level", "loud")]))
            .await
            .unwrap_err();
        assert!(matches!(error, DispatchError::UnsupportedLevel(level) if level == "loud"));
    }

    #[tokio::test]
    async fn log_task_without_loggers_is_a_no_op() {
        let task = LogLevelTask::new(LogRegistry::detached(LevelFilter::INFO));
        let output = task.execute(&TaskParams::default()).await.unwrap();
        assert!(output.is_empty());
    }
}
