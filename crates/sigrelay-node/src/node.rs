//! Relay node - the process entry point.
//!
//! Architecture:
//! - One shared in-memory [`Relay`] injected into every HTTP handler
//! - Stale-peer sweeper running as a background task
//! - Shutdown flips a watch channel: the sweeper stops, pending long-polls
//!   are released, then axum drains in-flight requests

use crate::api::{self, AppState};
use crate::config::NodeConfig;
use crate::error::{Error, Result};
use axum::http::HeaderValue;
use sigrelay_core::{spawn_sweeper, Relay};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// A relay node instance.
pub struct RelayNode {
    config: NodeConfig,
    server_id: HeaderValue,
    relay: Arc<Relay>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl RelayNode {
    /// Create a new relay node.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let server_id = HeaderValue::from_str(&config.server_id)
            .map_err(|e| Error::Config(format!("invalid server id {:?}: {}", config.server_id, e)))?;
        let relay = Arc::new(Relay::new(config.relay.clone()));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            server_id,
            relay,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Get the shared relay.
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Handler state bound to this node's relay and shutdown signal.
    pub fn state(&self) -> AppState {
        AppState::new(self.relay(), self.shutdown.subscribe())
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Bind the configured address and serve until `stop` resolves.
    pub async fn run_until<F>(self, stop: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, stop).await
    }

    /// Serve on an already bound listener until `stop` resolves.
    pub async fn serve<F>(self, listener: TcpListener, stop: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let relay_config = &self.config.relay;
        tracing::info!("Relay node starting");
        tracing::info!("  HTTP: http://{}", listener.local_addr()?);
        tracing::info!("  Mailbox capacity: {}", relay_config.mailbox_capacity);
        tracing::info!(
            "  Idle timeout: {:?} (sweep every {:?})",
            relay_config.idle_timeout,
            relay_config.sweep_interval
        );

        let sweeper = spawn_sweeper(self.relay(), self.shutdown.subscribe());
        let app = api::build_router(self.state(), self.server_id.clone());

        let shutdown = Arc::clone(&self.shutdown);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop.await;
                tracing::info!("Shutting down, releasing pending long-polls");
                shutdown.send_replace(true);
            })
            .await?;

        if let Err(e) = sweeper.await {
            tracing::warn!("Sweeper task ended abnormally: {}", e);
        }
        tracing::info!("Relay node stopped");
        Ok(())
    }
}
