//! Built-in handlers for the operational surface.

use std::fmt::Write;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use sysinfo::{ProcessesToUpdate, System};

use crate::admin::tasks::{DispatchError, TaskParams};
use crate::admin::AdminState;

pub(crate) fn render_menu(context_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
	<title>Operational Menu</title>
</head>
<body>
	<h1>Operational Menu</h1>
	<ul>
		<li><a href="{0}/ping">Ping</a></li>
		<li><a href="{0}/runtime">Runtime</a></li>
		<li><a href="{0}/healthcheck">Healthcheck</a></li>
	</ul>
</body>
</html>
"#,
        context_path
    )
}

/// Root of the admin page.
pub(crate) async fn menu(State(state): State<AdminState>) -> Html<String> {
    Html(render_menu(&state.context_path))
}

pub(crate) async fn ping() -> &'static str {
    "pong\n"
}

/// Process/runtime statistics, sampled fresh on every request.
pub(crate) async fn runtime_stats() -> String {
    let mut out = String::new();

    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(0);
    let _ = writeln!(out, "CpuCount: {cpus}");

    let metrics = tokio::runtime::Handle::current().metrics();
    let _ = writeln!(out, "TokioWorkers: {}", metrics.num_workers());
    let _ = writeln!(out, "TokioAliveTasks: {}", metrics.num_alive_tasks());

    let mut system = System::new();
    system.refresh_memory();
    let pid = sysinfo::get_current_pid().ok();
    if let Some(pid) = pid {
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    }
    let process = pid.and_then(|pid| system.process(pid));
    if let Some(process) = process {
        if let Some(tasks) = process.tasks() {
            let _ = writeln!(out, "Threads: {}", tasks.len());
        }
    }
    let _ = writeln!(out, "MemStats:");
    if let Some(process) = process {
        let _ = writeln!(out, "\tResident: {}", process.memory());
        let _ = writeln!(out, "\tVirtual: {}", process.virtual_memory());
    }
    let _ = writeln!(out, "\tSystemTotal: {}", system.total_memory());
    let _ = writeln!(out, "\tSystemUsed: {}", system.used_memory());
    if let Some(process) = process {
        let _ = writeln!(out, "Uptime: {}s", process.run_time());
    }
    let _ = writeln!(out, "Version: {}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    out
}

/// Resident-set size of the current process, in bytes.
pub(crate) fn resident_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).map(|process| process.memory())
}

/// Runs every registered health check and reports per-name results.
///
/// 501 with zero checks registered, 500 when any check is unhealthy, 200
/// otherwise.
pub(crate) async fn healthcheck(State(state): State<AdminState>) -> Response {
    let results = state.health.run_all().await;
    if results.is_empty() {
        return (StatusCode::NOT_IMPLEMENTED, "No health checks registered.\n").into_response();
    }

    let mut body = String::new();
    let mut all_healthy = true;
    for (name, result) in &results {
        all_healthy &= result.healthy;
        let _ = writeln!(body, "{name}:\n\tHealthy: {}", result.healthy);
        if let Some(message) = &result.message {
            let _ = writeln!(body, "\tMessage: {message}");
        }
        if let Some(cause) = &result.cause {
            let _ = writeln!(body, "\tCause: {cause}");
        }
    }

    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, body).into_response()
}

/// Dispatches `POST /tasks/{name}` to the named task.
pub(crate) async fn dispatch_task(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    body: String,
) -> Response {
    let task = state.tasks.read().unwrap().get(&name).cloned();
    let Some(task) = task else {
        return DispatchError::UnknownTask(name).into_response();
    };

    let params = TaskParams::new(query, body);
    match task.execute(&params).await {
        Ok(output) => (StatusCode::OK, output).into_response(),
        Err(error) => error.into_response(),
    }
}
