//! Service wiring: stores, lifecycle core, observers and background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokentrust_lifecycle::{Stores, TokenLifecycle};
use tokentrust_rpc::{AppState, RpcServer};
use tokentrust_store_memory::{MemoryAuditLog, MemoryEventStore, MemoryTokenStore};
use tokentrust_types::{Clock, SystemClock};
use tokentrust_websocket::{WebSocketServer, WsNotifier, WsState};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::metrics::ServiceMetrics;
use crate::shutdown::{ShutdownController, ShutdownReason};
use crate::sweeper::ExpirySweeper;
use crate::ServiceError;

/// Time allowed for background tasks to finish after the shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TokenTrustService {
    config: ServiceConfig,
    lifecycle: Arc<TokenLifecycle>,
    metrics: Arc<ServiceMetrics>,
    ws_state: Option<Arc<WsState>>,
    pub shutdown: Arc<ShutdownController>,
    task_handles: Vec<JoinHandle<()>>,
}

impl TokenTrustService {
    /// Build the service on the system clock.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        config.validate()?;

        let metrics = Arc::new(ServiceMetrics::new()?);
        let ws_state = config
            .enable_websocket
            .then(|| Arc::new(WsState::new(config.ws_channel_capacity)));

        let stores = Stores {
            tokens: Arc::new(MemoryTokenStore::new()),
            events: Arc::new(MemoryEventStore::new()),
            audit: Arc::new(MemoryAuditLog::new()),
        };
        let mut lifecycle = TokenLifecycle::new(stores, clock, config.lifecycle.clone())?;

        let observer = Arc::clone(&metrics);
        lifecycle.subscribe(Box::new(move |event| observer.observe(event)));

        if let Some(ws) = &ws_state {
            lifecycle = lifecycle.with_notifier(Arc::new(WsNotifier::new(Arc::clone(ws))));
            let feed = Arc::clone(ws);
            lifecycle.subscribe(Box::new(move |event| {
                if let Err(e) = feed.publish_lifecycle(event) {
                    warn!("failed to publish lifecycle event: {e}");
                }
            }));
        }

        info!(
            approve_max = config.lifecycle.thresholds.approve_max,
            medium_max = config.lifecycle.thresholds.medium_max,
            verification_timeout_secs = config.lifecycle.verification_timeout_secs,
            "lifecycle core ready"
        );

        Ok(Self {
            config,
            lifecycle: Arc::new(lifecycle),
            metrics,
            ws_state,
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Vec::new(),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Arc<TokenLifecycle> {
        &self.lifecycle
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// `None` when the WebSocket feed is disabled.
    pub fn ws_state(&self) -> Option<&Arc<WsState>> {
        self.ws_state.as_ref()
    }

    /// Spawn the sweeper and the enabled servers. Must run inside a Tokio runtime.
    pub fn start(&mut self) {
        // ── Expiry sweeper ────────────────────────────────────────────────
        let mut sweeper = ExpirySweeper::new(
            Arc::clone(&self.lifecycle),
            Duration::from_secs(self.config.sweep_interval_secs),
        );
        if self.config.enable_metrics {
            sweeper = sweeper.with_metrics(Arc::clone(&self.metrics));
        }
        let sweeper_handle = tokio::spawn(sweeper.run(self.shutdown.subscribe()));
        self.task_handles.push(sweeper_handle);

        // ── RPC server (optional) ─────────────────────────────────────────
        if self.config.enable_rpc {
            let mut state = AppState::new(Arc::clone(&self.lifecycle));
            if self.config.enable_metrics {
                state = state.with_registry(self.metrics.registry.clone());
            }
            let rpc_server = RpcServer::new(self.config.rpc_port, state);
            let shutdown_rx = self.shutdown.subscribe();

            let rpc_handle = tokio::spawn(async move {
                match rpc_server.start(shutdown_rx).await {
                    Ok(()) => info!("RPC server exited"),
                    Err(e) => error!("RPC server error: {e}"),
                }
            });
            self.task_handles.push(rpc_handle);
        }

        // ── WebSocket server (optional) ───────────────────────────────────
        if let Some(ws_state) = &self.ws_state {
            let ws_server = WebSocketServer::with_state(self.config.websocket_port, Arc::clone(ws_state));
            let shutdown_rx = self.shutdown.subscribe();

            let ws_handle = tokio::spawn(async move {
                match ws_server.start(shutdown_rx).await {
                    Ok(()) => info!("WebSocket server exited"),
                    Err(e) => error!("WebSocket server error: {e}"),
                }
            });
            self.task_handles.push(ws_handle);
        }

        info!(
            rpc = %port_label(self.config.enable_rpc, self.config.rpc_port),
            websocket = %port_label(self.ws_state.is_some(), self.config.websocket_port),
            sweep_interval_secs = self.config.sweep_interval_secs,
            "TokenTrust service started"
        );
    }

    /// Start, wait for SIGINT/SIGTERM (or an in-process trigger), then stop.
    pub async fn run(&mut self) -> Result<(), ServiceError> {
        self.start();
        self.shutdown.wait().await;
        self.stop().await
    }

    /// Signal every task and wait for them (bounded by a timeout).
    pub async fn stop(&mut self) -> Result<(), ServiceError> {
        self.shutdown.trigger(ShutdownReason::Requested);
        let reason = self.shutdown.reason().unwrap_or(ShutdownReason::Requested);
        info!(%reason, "TokenTrust service stopping");

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            warn!(
                "shutdown timeout ({:?}); some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        let stats = self.lifecycle.stats()?;
        info!(
            tokens = stats.tokens,
            events = stats.events,
            open_events = stats.open_events,
            audit_entries = stats.audit_entries,
            "TokenTrust service stopped"
        );
        Ok(())
    }
}

fn port_label(enabled: bool, port: u16) -> String {
    if enabled {
        port.to_string()
    } else {
        "off".to_string()
    }
}
