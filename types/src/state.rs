//! State enums for tokens and risk-analysis events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a trust token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Usable for payment.
    Active,
    /// Temporarily blocked pending verification; may return to `Active`.
    Frozen,
    /// Permanently blocked. Terminal.
    Revoked,
}

impl TokenState {
    pub const ALL: [TokenState; 3] = [Self::Active, Self::Frozen, Self::Revoked];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Frozen => "frozen",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a risk-analysis event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Low risk; no verification requested.
    Approved,
    /// Token frozen; awaiting the merchant's verification response.
    WaitingVerification,
    /// Merchant confirmed the transaction.
    VerifiedSuccess,
    /// Merchant rejected the transaction, or the verification window lapsed.
    VerifiedFailure,
    /// An external triage decision replaced the default policy.
    AgentOverridden,
}

impl EventStatus {
    pub const ALL: [EventStatus; 5] = [
        Self::Approved,
        Self::WaitingVerification,
        Self::VerifiedSuccess,
        Self::VerifiedFailure,
        Self::AgentOverridden,
    ];

    /// Whether the event is still accepting a verification response.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::WaitingVerification)
    }

    /// Whether the event reached a verification outcome. Terminal events
    /// never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::VerifiedSuccess | Self::VerifiedFailure | Self::AgentOverridden
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::WaitingVerification => "waiting_verification",
            Self::VerifiedSuccess => "verified_success",
            Self::VerifiedFailure => "verified_failure",
            Self::AgentOverridden => "agent_overridden",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
