//! TokenTrust service: the process around the lifecycle core.
//!
//! The service:
//! - Loads configuration from TOML
//! - Initialises structured logging
//! - Builds the in-memory stores and the lifecycle core
//! - Feeds Prometheus metrics from the lifecycle event bus
//! - Serves the HTTP API and the WebSocket merchant feed
//! - Sweeps lapsed verification windows on an interval
//! - Shuts everything down on SIGINT/SIGTERM

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod shutdown;
pub mod sweeper;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use logging::{init_logging, LogFormat};
pub use metrics::ServiceMetrics;
pub use service::TokenTrustService;
pub use shutdown::{ShutdownController, ShutdownReason};
pub use sweeper::ExpirySweeper;
