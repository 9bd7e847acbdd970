//! HTTP API for the TokenTrust lifecycle core.
//!
//! Provides endpoints for:
//! - Token issuance and merchant token listings
//! - Risk analysis (caller-supplied score or the configured oracle)
//! - Merchant verification responses
//! - Triage overrides
//! - Token primitives (freeze, unfreeze, revoke)
//! - Event, token and audit queries
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{AppState, RpcServer};
