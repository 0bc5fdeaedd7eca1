//! Reporting server lifecycle

use crate::handlers::AppState;
use crate::router::build_router;
use axum::Router;
use kubecheck_config::ServerConfig;
use kubecheck_core::Result;
use kubecheck_runtime::ShutdownSignal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// HTTP server exposing healthcheck reports
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: ShutdownSignal,
}

impl Server {
    /// Create a server; runs in flight are cancelled once `shutdown` triggers
    pub fn new(config: ServerConfig, state: AppState, shutdown: ShutdownSignal) -> Self {
        let state = Arc::new(
            state
                .with_debug(config.debug)
                .with_shutdown(shutdown.clone()),
        );

        Self {
            config,
            state,
            shutdown,
        }
    }

    /// Get listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen
    }

    /// Build the router serving this server's state
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state), self.config.request_timeout)
    }

    /// Get shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Serve until shutdown, then drain connections within `shutdown_timeout`
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen).await?;

        tracing::info!(
            listen = %self.config.listen,
            checks = self.state.checks().len(),
            debug = self.config.debug,
            "Reporting server listening"
        );

        let shutdown = self.shutdown.clone();
        let serve = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await });

        let shutdown_timeout = self.config.shutdown_timeout;
        let deadline = async {
            self.shutdown.cancelled().await;
            let start = Instant::now();
            tracing::info!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Waiting for in-flight requests"
            );
            tokio::time::sleep(shutdown_timeout).await;
            start
        };

        tokio::select! {
            result = serve => {
                result?;
                tracing::info!("Server shut down cleanly");
            }
            start = deadline => {
                tracing::warn!(
                    elapsed_ms = start.elapsed().as_millis(),
                    "Shutdown timeout reached, forcing shutdown"
                );
            }
        }

        Ok(())
    }
}
