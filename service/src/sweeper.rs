//! Background expiry of lapsed verification windows.
//!
//! Reads already close overdue windows lazily; the sweeper makes sure a
//! window nobody looks at is still closed (and its token revoked) within one
//! interval of its deadline. Each tick also refreshes the store gauges.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokentrust_lifecycle::{LifecycleError, TokenLifecycle};
use tracing::{debug, info, warn};

use crate::metrics::ServiceMetrics;
use crate::shutdown::ShutdownReason;

pub struct ExpirySweeper {
    lifecycle: Arc<TokenLifecycle>,
    metrics: Option<Arc<ServiceMetrics>>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(lifecycle: Arc<TokenLifecycle>, interval: Duration) -> Self {
        Self {
            lifecycle,
            metrics: None,
            interval,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// One sweep. Returns how many windows were closed.
    pub fn tick(&self) -> Result<usize, LifecycleError> {
        let expired = self.lifecycle.sweep_expired()?;
        debug!(expired, "expiry sweep complete");
        if let Some(metrics) = &self.metrics {
            metrics.refresh(&self.lifecycle.stats()?);
        }
        Ok(expired)
    }

    /// Sweep every interval until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<ShutdownReason>) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                reason = shutdown.recv() => {
                    let reason = reason.unwrap_or(ShutdownReason::Requested);
                    info!(%reason, "expiry sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        warn!("expiry sweep failed: {e}");
                    }
                }
            }
        }
    }
}
