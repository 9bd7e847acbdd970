//! Merchant notification port.
//!
//! The core only decides *when* a merchant should hear about something.
//! Delivery (WebSocket push, webhook, ...) is an adapter concern, and a
//! failed delivery never fails the core call that triggered it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokentrust_types::{EventId, MerchantId, RiskTier, Timestamp, TokenId, TokenState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("notification channel closed")]
    Closed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "token.assigned")]
    TokenAssigned {
        token_id: TokenId,
        customer_id: String,
        amount: u64,
        currency: String,
        expires_at: Timestamp,
    },
    #[serde(rename = "verification.requested")]
    VerificationRequested {
        event_id: EventId,
        token_id: TokenId,
        amount: u64,
        risk_score: u8,
        tier: RiskTier,
        deadline: Timestamp,
        #[serde(default)]
        explanation: Option<String>,
    },
    #[serde(rename = "token.state_changed")]
    TokenStateChanged {
        token_id: TokenId,
        state: TokenState,
        reason: String,
    },
}

impl Notification {
    /// Topic name as seen by merchants.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenAssigned { .. } => "token.assigned",
            Self::VerificationRequested { .. } => "verification.requested",
            Self::TokenStateChanged { state, .. } => match state {
                TokenState::Active => "token.unfrozen",
                TokenState::Frozen => "token.frozen",
                TokenState::Revoked => "token.revoked",
            },
        }
    }

    pub fn token_id(&self) -> &TokenId {
        match self {
            Self::TokenAssigned { token_id, .. }
            | Self::VerificationRequested { token_id, .. }
            | Self::TokenStateChanged { token_id, .. } => token_id,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, merchant: &MerchantId, notification: &Notification) -> Result<(), NotifyError>;
}
