use thiserror::Error;
use tokentrust_risk::RiskError;
use tokentrust_store::StoreError;
use tokentrust_types::{EventId, EventStatus, MerchantId, Timestamp, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("risk score {0} is outside 0..=100")]
    InvalidScore(i64),

    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("token {0} is revoked")]
    TokenRevoked(TokenId),

    #[error("token {token} does not belong to merchant {merchant}")]
    MerchantMismatch { token: TokenId, merchant: MerchantId },

    #[error("event {0} not found")]
    EventNotFound(EventId),

    #[error("event {event} is not waiting for verification (status: {status})")]
    EventNotOpen { event: EventId, status: EventStatus },

    #[error("event {event} is already terminal (status: {status})")]
    EventAlreadyTerminal { event: EventId, status: EventStatus },

    #[error("verification window for event {event} closed at {deadline}")]
    VerificationExpired { event: EventId, deadline: Timestamp },

    #[error("token {token} already has event {event} waiting for verification")]
    VerificationPending { token: TokenId, event: EventId },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LifecycleError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidScore(_) => "invalid_score",
            Self::TokenNotFound(_) => "token_not_found",
            Self::TokenRevoked(_) => "token_revoked",
            Self::MerchantMismatch { .. } => "merchant_mismatch",
            Self::EventNotFound(_) => "event_not_found",
            Self::EventNotOpen { .. } => "event_not_open",
            Self::EventAlreadyTerminal { .. } => "event_already_terminal",
            Self::VerificationExpired { .. } => "verification_expired",
            Self::VerificationPending { .. } => "verification_pending",
            Self::Store(_) => "store_error",
        }
    }
}

impl From<RiskError> for LifecycleError {
    fn from(e: RiskError) -> Self {
        match e {
            RiskError::InvalidScore(score) => Self::InvalidScore(score),
        }
    }
}
