//! Service shutdown.
//!
//! One [`ShutdownController`] per service. The first trigger wins: its
//! [`ShutdownReason`] is kept and broadcast to the HTTP server, the WebSocket
//! server and the expiry sweeper. Later triggers are ignored.

use std::fmt;
use std::sync::OnceLock;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// [`ShutdownController::trigger`] from inside the process.
    Requested,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interrupt => "sigint",
            Self::Terminate => "sigterm",
            Self::Requested => "requested",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ShutdownController {
    tx: broadcast::Sender<ShutdownReason>,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            reason: OnceLock::new(),
        }
    }

    /// Receiver for the shutdown broadcast. A task subscribed after the
    /// trigger misses it, so subscribe before spawning.
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.tx.subscribe()
    }

    /// Start shutting down. Returns false if shutdown was already triggered.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        if self.reason.set(reason).is_err() {
            return false;
        }
        let _ = self.tx.send(reason);
        true
    }

    /// Why the service is stopping, once it is.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Wait for SIGINT, SIGTERM or an in-process trigger, whichever comes
    /// first, and return the reason that won.
    pub async fn wait(&self) -> ShutdownReason {
        let mut rx = self.subscribe();
        if let Some(reason) = self.reason() {
            return reason;
        }

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = signal::ctrl_c() => ShutdownReason::Interrupt,
            _ = terminate => ShutdownReason::Terminate,
            received = rx.recv() => received.unwrap_or(ShutdownReason::Requested),
        };

        if self.trigger(reason) {
            info!(%reason, "shutdown triggered");
        }
        self.reason().unwrap_or(reason)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
