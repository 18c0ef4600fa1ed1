//! Daemon: main runtime orchestrator.
//!
//! Ties together the brokerage core, the notification bus, metrics,
//! and the HTTP command surface.
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Wire ledger, engines, event bus, metrics
//! 3. Start the notification consumer
//! 4. Serve the API until SIGINT, then drain gracefully

use std::sync::Arc;

use prometheus::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bursar_engine::StaticPrices;

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::core::Brokerage;
use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{BusNotifier, EventBus};
use crate::metrics::Metrics;

/// The main bursar daemon.
pub struct Daemon {
    config: Config,
    state: Arc<ApiState>,
    event_bus: Arc<EventBus>,
}

impl Daemon {
    /// Wire a daemon with the in-memory core and an empty price feed.
    ///
    /// The market price port serves manually injected quotes only; the
    /// real feed is an external collaborator plugged in the same way.
    pub fn new_in_memory(config: Config) -> DaemonResult<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);
        let event_bus = Arc::new(EventBus::new(1000));
        let notifier = Arc::new(BusNotifier::new(event_bus.clone()));
        let market = Arc::new(StaticPrices::new());

        let brokerage = Arc::new(Brokerage::new(
            config.workflow.clone(),
            market,
            notifier,
            metrics,
        ));
        let state = Arc::new(ApiState { brokerage, registry });

        Ok(Self {
            config,
            state,
            event_bus,
        })
    }

    /// Shared API state (used by tests to drive the router directly).
    pub fn api_state(&self) -> Arc<ApiState> {
        self.state.clone()
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting bursar daemon"
        );

        let shutdown = CancellationToken::new();

        // Notification consumer: the stand-in for UI push / email
        // dispatch. Consumes the bus and logs each event.
        let consumer_shutdown = shutdown.clone();
        let mut receiver = self.event_bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = consumer_shutdown.cancelled() => break,
                    maybe_event = receiver.recv() => match maybe_event {
                        Some(Ok(event)) => {
                            info!(event_type = event.event_type(),
                                account_id = %event.account_id(),
                                "notification dispatched");
                        }
                        Some(Err(lag)) => warn!(%lag, "notification consumer lagged"),
                        None => break,
                    }
                }
            }
        });

        // API server
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Server(format!("bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Server(e.to_string()))?;
        info!(%local_addr, "API server listening");

        let router = create_router(self.state.clone());
        let serve_shutdown = shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown requested");
                serve_shutdown.cancel();
            })
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        info!("Daemon stopped");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_daemon_wiring() {
        let daemon = Daemon::new_in_memory(Config::test()).unwrap();
        let state = daemon.api_state();

        // The wired core serves requests immediately
        let account = state.brokerage.open_account().await;
        let fetched = state.brokerage.account(account.id).await.unwrap();
        assert_eq!(fetched.id, account.id);
    }
}
