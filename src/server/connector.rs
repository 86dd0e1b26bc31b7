//! A single bound listener serving one handler over one transport.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum_server::Handle;

use crate::config::{ConfigError, ConnectorConfig};
use crate::lifecycle::{LifecycleError, Shutdown};
use crate::server::tls::load_tls_config;
use crate::server::ServerError;

/// Which routes a connector serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorSide {
    Application,
    Admin,
    /// Both surfaces on one listener (the "simple" factory).
    Combined,
}

impl ConnectorSide {
    pub fn name(self) -> &'static str {
        match self {
            ConnectorSide::Application => "application",
            ConnectorSide::Admin => "admin",
            ConnectorSide::Combined => "combined",
        }
    }
}

/// One bound listener.
///
/// Owned exclusively by the server that created it; immutable after
/// construction except for the listener's open/closed state. The connector
/// occupies its address for its entire active lifetime.
pub struct Connector {
    side: ConnectorSide,
    config: ConnectorConfig,
    handle: Handle,
    shutdown: Shutdown,
    grace: Duration,
    router: Mutex<Option<Router>>,
    serving: Arc<AtomicBool>,
}

impl Connector {
    pub(crate) fn new(
        side: ConnectorSide,
        config: ConnectorConfig,
        shutdown: Shutdown,
        grace: Duration,
    ) -> Self {
        Self {
            side,
            config,
            handle: Handle::new(),
            shutdown,
            grace,
            router: Mutex::new(None),
            serving: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn side(&self) -> ConnectorSide {
        self.side
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Whether the accept loop is currently running.
    pub(crate) fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }

    pub(crate) fn install_router(&self, router: Router) {
        *self.router.lock().unwrap() = Some(router);
    }

    /// Bind the configured address and serve until closed.
    ///
    /// Blocks the calling task for the listener's whole active lifetime and
    /// returns `Ok(())` only for an intentional close.
    pub(crate) async fn run(&self) -> Result<(), ServerError> {
        let router = self.router.lock().unwrap().take().ok_or(LifecycleError {
            operation: "restarting a connector",
            phase: "serving",
        })?;

        // Subscribe before the sticky-flag check so a stop racing with
        // startup is observed either way.
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return Ok(());
        }

        let addr: SocketAddr = self
            .config
            .address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.config.address.clone()))?;

        // TLS material is loaded before the socket is bound so a bad
        // certificate never occupies the address.
        let tls = match &self.config.tls {
            Some(tls) => Some(load_tls_config(tls).await?),
            None => None,
        };

        let listener =
            std::net::TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(
            connector = self.side.name(),
            address = %local_addr,
            tls = tls.is_some(),
            "connector listening"
        );

        self.serving.store(true, Ordering::SeqCst);
        let _guard = ServingGuard(self.serving.clone());

        let handle = self.handle.clone();
        let grace = self.grace;
        let watcher = tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            handle.graceful_shutdown(Some(grace));
        });

        let served = match tls {
            Some(tls_config) => {
                axum_server::from_tcp_rustls(listener, tls_config)
                    .handle(self.handle.clone())
                    .serve(router.into_make_service())
                    .await
            }
            None => {
                axum_server::from_tcp(listener)
                    .handle(self.handle.clone())
                    .serve(router.into_make_service())
                    .await
            }
        };
        watcher.abort();

        tracing::info!(connector = self.side.name(), address = %local_addr, "connector stopped");
        served.map_err(|source| ServerError::Serve {
            addr: local_addr,
            source,
        })
    }
}

struct ServingGuard(Arc<AtomicBool>);

impl Drop for ServingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
