//! Token storage trait.

use crate::StoreError;
use tokentrust_types::{EventId, MerchantId, Timestamp, TokenId, TokenState};
use serde::{Deserialize, Serialize};

/// Per-token information held by the authoritative store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: TokenId,
    pub merchant_id: MerchantId,
    pub customer_id: String,
    pub payment_reference: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub currency: String,
    pub state: TokenState,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Reason given for the last state transition.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub auto_revoke_candidate: bool,
    /// The single `waiting_verification` event of this token, if any.
    #[serde(default)]
    pub open_event: Option<EventId>,
    /// Audit sequence numbers of every entry recorded against this token,
    /// oldest first.
    #[serde(default)]
    pub history: Vec<u64>,
}

impl TokenRecord {
    /// Expiry is passive: it is reported to readers, never enforced as a
    /// state transition.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_passed(now)
    }
}

/// Trait for token storage operations.
pub trait TokenStore: Send + Sync {
    fn get_token(&self, id: &TokenId) -> Result<Option<TokenRecord>, StoreError>;

    /// Insert or overwrite a token.
    ///
    /// The core writes a token last, after its audit entries, so
    /// overwriting a token the store already holds must only fail on a
    /// backend fault. Rejections such as an idempotency clash are raised on
    /// first insert, which the core performs before auditing.
    fn put_token(&self, token: &TokenRecord) -> Result<(), StoreError>;

    /// Look up a token previously issued for `(merchant, key)`.
    fn find_by_idempotency(
        &self,
        merchant: &MerchantId,
        key: &str,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Tokens of one merchant issued at or after `since`, newest first,
    /// at most `limit` of them.
    fn tokens_for_merchant(
        &self,
        merchant: &MerchantId,
        since: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<TokenRecord>, StoreError>;

    fn token_count(&self) -> Result<u64, StoreError>;

    fn exists(&self, id: &TokenId) -> Result<bool, StoreError> {
        self.get_token(id).map(|t| t.is_some())
    }
}
