//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::acceptor::PeerCertAcceptor;
use super::router::{AppState, create_router};
use crate::config::Config;
use crate::mtls::{AllowListStore, Authenticator, WhitelistWatcher, build_tls_config};
use crate::{Error, Result};

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// mTLS certificate gateway
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Whitelist shared by the authenticator, the watcher and the admin endpoints
    whitelist: Arc<AllowListStore>,
}

impl Gateway {
    /// Create a new gateway
    ///
    /// The whitelist is loaded immediately. A missing or malformed document
    /// disables the whitelist rather than failing startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let whitelist = Arc::new(AllowListStore::new(config.whitelist.path.clone()));
        whitelist.load();

        Ok(Self { config, whitelist })
    }

    /// The whitelist store
    #[must_use]
    pub fn whitelist(&self) -> &Arc<AllowListStore> {
        &self.whitelist
    }

    /// Run the gateway until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns an error if TLS material cannot be loaded or the listener fails.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_addr()?;
        let tls = build_tls_config(&self.config.tls)?;

        // Create shutdown channel
        let (shutdown_tx, _) = broadcast::channel(1);

        let _watcher = if self.config.whitelist.watch {
            match WhitelistWatcher::start(Arc::clone(&self.whitelist), shutdown_tx.subscribe()) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, "Whitelist hot-reload unavailable");
                    None
                }
            }
        } else {
            None
        };

        let state = Arc::new(AppState {
            authenticator: Authenticator::new(Arc::clone(&self.whitelist)),
        });
        let app = create_router(state);

        let acceptor = PeerCertAcceptor::new(
            RustlsAcceptor::new(RustlsConfig::from_config(tls.server_config)),
            tls.assessor,
        );

        let handle: Handle<SocketAddr> = Handle::new();
        tokio::spawn(shutdown_signal(shutdown_tx, handle.clone()));

        info!(
            addr = %addr,
            require_client_cert = self.config.tls.require_client_cert,
            "Gateway listening (TLS)"
        );

        axum_server::bind(addr)
            .acceptor(acceptor)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>, handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn new_rejects_incomplete_tls_config() {
        let result = Gateway::new(Config::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn new_loads_whitelist_fail_open() {
        // GIVEN: complete TLS paths and a malformed whitelist document
        let dir = tempfile::tempdir().unwrap();
        let wl = dir.path().join("whitelist.json");
        fs::write(&wl, "{ not json").unwrap();

        let mut config = Config::default();
        config.tls.server_cert = "server.crt".into();
        config.tls.server_key = "server.key".into();
        config.tls.ca_cert = "ca.crt".into();
        config.whitelist.path = wl;

        // WHEN: the gateway is created
        let gateway = Gateway::new(config).unwrap();

        // THEN: the whitelist is disabled and the error is recorded
        let status = gateway.whitelist().status();
        assert!(!status.enabled);
        assert!(status.last_error.is_some());
        assert!(gateway.whitelist().check("AA:BB").allowed);
    }
}
