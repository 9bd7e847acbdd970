//! Risk-analysis event storage trait.

use crate::StoreError;
use tokentrust_types::{
    AgentDecision, Decision, EventId, EventStatus, MerchantId, RiskScore, RiskTier, Timestamp,
    TokenId,
};
use serde::{Deserialize, Serialize};

/// Outcome of a merchant verification, or of the verification window lapsing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub verified: bool,
    /// How the response arrived (`merchant_response`, `timeout`, ...).
    pub method: String,
    #[serde(default)]
    pub responder: Option<String>,
    #[serde(default)]
    pub evidence: Option<serde_json::Value>,
    pub at: Timestamp,
}

/// Decision supplied by an external triage process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRecord {
    pub decision: AgentDecision,
    pub reasoning: String,
    pub at: Timestamp,
}

/// One risk-analysis request against one token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub token_id: TokenId,
    pub merchant_id: MerchantId,
    pub amount: u64,
    pub risk_score: RiskScore,
    pub tier: RiskTier,
    pub decision: Decision,
    pub status: EventStatus,
    #[serde(default)]
    pub auto_revoke_candidate: bool,
    /// Explanation returned by the risk oracle, when one was consulted.
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// End of the verification window; set while a response is requested.
    #[serde(default)]
    pub deadline: Option<Timestamp>,
    #[serde(default)]
    pub verification: Option<VerificationRecord>,
    #[serde(default)]
    pub triage: Option<TriageRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EventRecord {
    /// Still waiting for a response but past its deadline.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.status.is_open() && self.deadline.is_some_and(|d| d.is_passed(now))
    }
}

/// Trait for event storage operations.
pub trait EventStore: Send + Sync {
    fn get_event(&self, id: &EventId) -> Result<Option<EventRecord>, StoreError>;

    /// Insert or overwrite an event. Called before the matching audit entry
    /// is appended, so a rejected write leaves the audit log untouched.
    fn put_event(&self, event: &EventRecord) -> Result<(), StoreError>;

    /// All events of a token, oldest first.
    fn events_for_token(&self, token: &TokenId) -> Result<Vec<EventRecord>, StoreError>;

    /// Every event currently in `waiting_verification`.
    fn open_events(&self) -> Result<Vec<EventRecord>, StoreError>;

    fn event_count(&self) -> Result<u64, StoreError>;
}
