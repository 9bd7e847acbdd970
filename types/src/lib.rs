//! Fundamental types for TokenTrust.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, timestamps and the clock port, token/event state enums, risk tiers
//! and decisions, and the lifecycle parameters.

pub mod error;
pub mod ids;
pub mod params;
pub mod risk;
pub mod state;
pub mod time;

pub use error::ParamsError;
pub use ids::{EventId, MerchantId, TokenId};
pub use params::{LifecycleParams, RiskThresholds};
pub use risk::{AgentDecision, Decision, RiskScore, RiskTier, UnknownDecision};
pub use state::{EventStatus, TokenState};
pub use time::{Clock, SystemClock, Timestamp};
