//! Read operations. Reads that touch a single token or event reconcile an
//! overdue verification window first, so a reader never observes a lapsed
//! window as still open.

use crate::lifecycle::TokenLifecycle;
use crate::LifecycleError;
use serde::Serialize;
use tokentrust_store::{AuditEntry, EventRecord, TokenRecord};
use tokentrust_types::{EventId, MerchantId, Timestamp, TokenId};

/// Upper bound on tokens returned by one merchant listing.
pub const MAX_MERCHANT_TOKENS: usize = 100;
/// Audit entries returned when the caller gives no limit.
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    #[serde(flatten)]
    pub token: TokenRecord,
    /// Past `expires_at`. Expiry is reported, not enforced.
    pub expired: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleStats {
    pub tokens: u64,
    pub events: u64,
    pub open_events: u64,
    pub audit_entries: u64,
}

impl TokenLifecycle {
    pub fn token(&self, id: &TokenId) -> Result<TokenStatus, LifecycleError> {
        self.with_token_lock(id, |outbox| {
            let now = self.now();
            let mut token = self.load_token(id)?;
            if self.reconcile_locked(&mut token, now, outbox)? {
                self.stores.tokens.put_token(&token)?;
            }
            Ok(TokenStatus {
                expired: token.is_expired(now),
                token,
            })
        })
    }

    /// Tokens of `merchant` issued at or after `since`, newest first.
    pub fn tokens_for_merchant(
        &self,
        merchant: &MerchantId,
        since: Option<Timestamp>,
    ) -> Result<Vec<TokenRecord>, LifecycleError> {
        Ok(self
            .stores
            .tokens
            .tokens_for_merchant(merchant, since, MAX_MERCHANT_TOKENS)?)
    }

    pub fn event(&self, id: &EventId) -> Result<EventRecord, LifecycleError> {
        let token_id = self.load_event(id)?.token_id;
        self.with_token_lock(&token_id, |outbox| {
            let now = self.now();
            let event = self.load_event(id)?;
            if !event.is_overdue(now) {
                return Ok(event);
            }
            let mut token = self.load_token(&token_id)?;
            let expired = self.expire_locked(&mut token, event, now, outbox)?;
            self.stores.tokens.put_token(&token)?;
            Ok(expired)
        })
    }

    /// All events of a token, oldest first.
    pub fn events_for_token(&self, id: &TokenId) -> Result<Vec<EventRecord>, LifecycleError> {
        // Reconcile through the token read so an overdue window shows as closed.
        self.token(id)?;
        Ok(self.stores.events.events_for_token(id)?)
    }

    /// The most recent `limit` audit entries for a token or event id,
    /// oldest first.
    pub fn audit_for(
        &self,
        target: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>, LifecycleError> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
        Ok(self.stores.audit.entries_for_target(target, limit)?)
    }

    /// Re-derive the audit hash chain. Fails with a store corruption error
    /// if any entry was altered, dropped or reordered.
    pub fn verify_audit_chain(&self) -> Result<(), LifecycleError> {
        Ok(self.stores.audit.verify_chain()?)
    }

    pub fn stats(&self) -> Result<LifecycleStats, LifecycleError> {
        Ok(LifecycleStats {
            tokens: self.stores.tokens.token_count()?,
            events: self.stores.events.event_count()?,
            open_events: self.stores.events.open_events()?.len() as u64,
            audit_entries: self.stores.audit.len()?,
        })
    }
}
