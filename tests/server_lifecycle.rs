//! Server lifecycle: concurrent start, first-error-wins, bounded stop.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use gantry::config::{Config, ConnectorConfig};
use gantry::{Managed, ManagedError, ServerError};
use tokio::sync::Notify;

#[tokio::test]
async fn clean_stop_returns_ok() {
    let (config, _app_port, admin_port) = common::default_config();
    let mut environment = common::environment();
    let server = Arc::new(common::build_server(&config, &mut environment));

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };

    let client = reqwest::Client::new();
    common::wait_until_serving(&client, &format!("http://127.0.0.1:{admin_port}/ping")).await;

    server.stop().await.unwrap();
    let result = runner.await.unwrap();
    assert!(result.is_ok(), "clean close must not be an error: {result:?}");
    assert!(server.is_stopped());
}

#[tokio::test]
async fn first_bind_error_wins_and_unwinds_the_rest() {
    let (config, app_port, admin_port) = common::default_config();
    // Occupy the admin address so that connector fails to bind.
    let blocker = std::net::TcpListener::bind(common::loopback(admin_port)).unwrap();

    let mut environment = common::environment();
    let server = common::build_server(&config, &mut environment);

    let error = server.start().await.unwrap_err();
    match error {
        ServerError::Bind { addr, .. } => assert_eq!(addr.port(), admin_port),
        other => panic!("expected a bind error, got {other}"),
    }
    assert!(server.is_stopped(), "stop must run on the failure path");
    drop(blocker);

    // The application connector was unwound; its address frees up.
    let mut freed = false;
    for _ in 0..100 {
        if std::net::TcpListener::bind(common::loopback(app_port)).is_ok() {
            freed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(freed, "application connector should have been unwound");
}

#[tokio::test]
async fn stop_is_idempotent_even_without_start() {
    let (config, _, _) = common::default_config();
    let mut environment = common::environment();
    let server = common::build_server(&config, &mut environment);

    server.stop().await.unwrap();
    server.stop().await.unwrap();
    assert!(server.is_stopped());
}

#[tokio::test]
async fn start_twice_is_a_lifecycle_error() {
    let (config, _, admin_port) = common::default_config();
    let mut environment = common::environment();
    let server = Arc::new(common::build_server(&config, &mut environment));

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };
    let client = reqwest::Client::new();
    common::wait_until_serving(&client, &format!("http://127.0.0.1:{admin_port}/ping")).await;

    let error = server.start().await.unwrap_err();
    assert!(matches!(error, ServerError::Lifecycle(_)));

    server.stop().await.unwrap();
    assert!(runner.await.unwrap().is_ok());
}

struct FailingComponent;

#[async_trait]
impl Managed for FailingComponent {
    async fn start(&self) -> Result<(), ManagedError> {
        Err("boom".into())
    }

    async fn stop(&self) -> Result<(), ManagedError> {
        Ok(())
    }
}

#[tokio::test]
async fn failing_managed_component_aborts_startup() {
    let (config, _, _) = common::default_config();
    let mut environment = common::environment();
    environment
        .lifecycle()
        .manage("failing", Arc::new(FailingComponent))
        .unwrap();
    let server = common::build_server(&config, &mut environment);

    let error = server.start().await.unwrap_err();
    match error {
        ServerError::Managed { name, .. } => assert_eq!(name, "failing"),
        other => panic!("expected a managed-component error, got {other}"),
    }
    assert!(server.is_stopped());
}

struct BlockingComponent {
    release: Notify,
    stops: AtomicUsize,
}

#[async_trait]
impl Managed for BlockingComponent {
    async fn start(&self) -> Result<(), ManagedError> {
        // Blocks for the component's whole active lifetime.
        self.release.notified().await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), ManagedError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.release.notify_one();
        Ok(())
    }
}

#[tokio::test]
async fn stop_unblocks_a_blocked_managed_start() {
    let (config, _, admin_port) = common::default_config();
    let mut environment = common::environment();
    let component = Arc::new(BlockingComponent {
        release: Notify::new(),
        stops: AtomicUsize::new(0),
    });
    environment
        .lifecycle()
        .manage("blocking", component.clone())
        .unwrap();
    let server = Arc::new(common::build_server(&config, &mut environment));

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };
    let client = reqwest::Client::new();
    common::wait_until_serving(&client, &format!("http://127.0.0.1:{admin_port}/ping")).await;

    server.stop().await.unwrap();
    assert!(runner.await.unwrap().is_ok());
    assert_eq!(component.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn registration_is_rejected_after_start() {
    let (config, _, admin_port) = common::default_config();
    let mut environment = common::environment();
    let server = Arc::new(common::build_server(&config, &mut environment));

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };
    let client = reqwest::Client::new();
    common::wait_until_serving(&client, &format!("http://127.0.0.1:{admin_port}/ping")).await;

    assert!(environment
        .handler()
        .handle("/late", get(|| async { "late" }))
        .is_err());
    assert!(environment
        .lifecycle()
        .manage("late", Arc::new(FailingComponent))
        .is_err());

    server.stop().await.unwrap();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn tls_material_is_loaded_before_the_address_is_bound() {
    let (mut config, _, admin_port) = common::default_config();
    config.server.admin_connectors[0].tls = Some(gantry::config::TlsConfig {
        cert_path: "/nonexistent/cert.pem".to_string(),
        key_path: "/nonexistent/key.pem".to_string(),
    });
    let mut environment = common::environment();
    let server = common::build_server(&config, &mut environment);

    let error = server.start().await.unwrap_err();
    assert!(matches!(
        error,
        ServerError::Config(gantry::config::ConfigError::Tls(_))
    ));
    // The bad certificate never occupied the address.
    assert!(std::net::TcpListener::bind(common::loopback(admin_port)).is_ok());
}

#[tokio::test]
async fn simple_factory_serves_both_surfaces_on_one_connector() {
    let port = common::free_port();
    let mut config = Config::default();
    config.server.kind = "simple".to_string();
    config.server.connector = ConnectorConfig::new(&common::loopback(port));
    config.server.stop_grace_secs = 2;

    let mut environment = common::environment();
    environment
        .handler()
        .handle("/hello", get(|| async { "hi\n" }))
        .unwrap();
    let server = Arc::new(common::build_server(&config, &mut environment));

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };
    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");
    common::wait_until_serving(&client, &format!("{base}/admin/ping")).await;

    let pong = client.get(format!("{base}/admin/ping")).send().await.unwrap();
    assert_eq!(pong.text().await.unwrap(), "pong\n");

    let hello = client
        .get(format!("{base}/application/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(hello.text().await.unwrap(), "hi\n");

    server.stop().await.unwrap();
    assert!(runner.await.unwrap().is_ok());
}
