//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;

use tokentrust_types::LifecycleParams;

use crate::logging::LogFormat;
use crate::ServiceError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_true")]
    pub enable_rpc: bool,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default = "default_true")]
    pub enable_websocket: bool,

    #[serde(default = "default_ws_port")]
    pub websocket_port: u16,

    /// Per-topic broadcast buffer for WebSocket subscribers.
    #[serde(default = "default_ws_channel_capacity")]
    pub ws_channel_capacity: usize,

    /// `human` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// How often lapsed verification windows are closed in the background.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub lifecycle: LifecycleParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_rpc_port() -> u16 {
    8000
}

fn default_ws_port() -> u16 {
    8001
}

fn default_ws_channel_capacity() -> usize {
    256
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    30
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServiceConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ServiceError> {
        toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> Result<LogFormat, ServiceError> {
        self.log_format.parse()
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.lifecycle.validate()?;
        self.log_format()?;
        if self.sweep_interval_secs == 0 {
            return Err(ServiceError::Config(
                "sweep_interval_secs must be greater than zero".into(),
            ));
        }
        if self.ws_channel_capacity == 0 {
            return Err(ServiceError::Config(
                "ws_channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable_rpc: default_true(),
            rpc_port: default_rpc_port(),
            enable_websocket: default_true(),
            websocket_port: default_ws_port(),
            ws_channel_capacity: default_ws_channel_capacity(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: default_true(),
            sweep_interval_secs: default_sweep_interval_secs(),
            lifecycle: LifecycleParams::default(),
        }
    }
}
