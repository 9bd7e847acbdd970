//! The lifecycle core: shared state plus the building blocks every public
//! operation is assembled from.
//!
//! Every mutating operation follows the same shape:
//! 1. resolve the token id (for event operations, from the event),
//! 2. take that token's lock and re-read everything under it,
//! 3. reconcile an overdue verification window,
//! 4. validate, then write event, audit entries and token,
//! 5. release the lock and deliver bus events and notifications.

use crate::events::{EventBus, LifecycleEvent, VerificationResult};
use crate::locks::TokenLocks;
use crate::notify::{Notification, Notifier};
use crate::transition::{token_transition, TokenOp, Transition};
use crate::LifecycleError;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use tokentrust_risk::{RiskOracle, RuleBasedOracle};
use tokentrust_store::{
    AuditAction, AuditEntry, AuditLog, EventRecord, EventStore, NewAuditEntry, TokenRecord,
    TokenStore, VerificationRecord,
};
use tokentrust_types::{
    Clock, EventId, EventStatus, LifecycleParams, MerchantId, ParamsError, Timestamp, TokenId,
    TokenState,
};
use tracing::{debug, info, warn};

pub const SYSTEM_ACTOR: &str = "system";
pub const RISK_ENGINE_ACTOR: &str = "risk_engine";
pub const MERCHANT_ACTOR: &str = "merchant";
pub const TRIAGE_ACTOR: &str = "triage_agent";

/// The three authoritative stores.
#[derive(Clone)]
pub struct Stores {
    pub tokens: Arc<dyn TokenStore>,
    pub events: Arc<dyn EventStore>,
    pub audit: Arc<dyn AuditLog>,
}

/// Side effects collected under a token lock and delivered after release.
#[derive(Default)]
pub(crate) struct Outbox {
    events: Vec<LifecycleEvent>,
    notifications: Vec<(MerchantId, Notification)>,
}

impl Outbox {
    pub(crate) fn emit(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    pub(crate) fn notify(&mut self, merchant: MerchantId, notification: Notification) {
        self.notifications.push((merchant, notification));
    }
}

/// Result of one token primitive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub token_id: TokenId,
    pub previous: TokenState,
    pub state: TokenState,
    pub action: AuditAction,
    pub audit_seq: u64,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        self.previous != self.state
    }
}

/// Risk-driven token lifecycle state machine.
pub struct TokenLifecycle {
    pub(crate) stores: Stores,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) params: LifecycleParams,
    pub(crate) locks: TokenLocks,
    /// Serialises issuance so an idempotency key maps to one token.
    pub(crate) issue_lock: Mutex<()>,
    pub(crate) bus: EventBus,
    pub(crate) notifier: Option<Arc<dyn Notifier>>,
    pub(crate) oracle: Arc<dyn RiskOracle>,
}

impl TokenLifecycle {
    /// Fails if `params` are inconsistent. Uses the rule-based oracle until
    /// another is configured.
    pub fn new(
        stores: Stores,
        clock: Arc<dyn Clock>,
        params: LifecycleParams,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            stores,
            clock,
            params,
            locks: TokenLocks::new(),
            issue_lock: Mutex::new(()),
            bus: EventBus::new(),
            notifier: None,
            oracle: Arc::new(RuleBasedOracle::new()),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RiskOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Register an observer. Must be called before the core is shared.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LifecycleEvent) + Send + Sync>) {
        self.bus.subscribe(listener);
    }

    pub fn params(&self) -> &LifecycleParams {
        &self.params
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ── Internals ──────────────────────────────────────────────────────

    /// Run `f` under the lock of `token`, then deliver whatever it queued.
    ///
    /// The outbox is delivered even when `f` fails: it only ever holds
    /// effects that were committed before the failure (an expiry
    /// reconciled on the way in, for example).
    pub(crate) fn with_token_lock<T>(
        &self,
        token: &TokenId,
        f: impl FnOnce(&mut Outbox) -> Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        let handle = self.locks.handle(token);
        let mut outbox = Outbox::default();
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut outbox)
        };
        self.locks.release(token, handle);
        self.deliver(outbox);
        result
    }

    pub(crate) fn deliver(&self, outbox: Outbox) {
        for event in &outbox.events {
            self.bus.emit(event);
        }
        let Some(notifier) = &self.notifier else {
            return;
        };
        for (merchant, notification) in &outbox.notifications {
            if let Err(e) = notifier.notify(merchant, notification) {
                warn!(
                    merchant = %merchant,
                    kind = notification.kind(),
                    token = %notification.token_id(),
                    error = %e,
                    "merchant notification failed"
                );
            }
        }
    }

    pub(crate) fn load_token(&self, id: &TokenId) -> Result<TokenRecord, LifecycleError> {
        self.stores
            .tokens
            .get_token(id)?
            .ok_or_else(|| LifecycleError::TokenNotFound(id.clone()))
    }

    pub(crate) fn load_event(&self, id: &EventId) -> Result<EventRecord, LifecycleError> {
        self.stores
            .events
            .get_event(id)?
            .ok_or_else(|| LifecycleError::EventNotFound(id.clone()))
    }

    /// Append an entry about `token` or one of its events and link it into
    /// the token's history. The token itself is persisted by the caller.
    pub(crate) fn record(
        &self,
        token: &mut TokenRecord,
        entry: NewAuditEntry,
    ) -> Result<AuditEntry, LifecycleError> {
        let sealed = self.stores.audit.append(entry)?;
        token.history.push(sealed.seq);
        Ok(sealed)
    }

    /// Fail with `TokenRevoked` if `op` would be rejected. Used to validate
    /// before anything is written.
    pub(crate) fn ensure_allowed(token: &TokenRecord, op: TokenOp) -> Result<(), LifecycleError> {
        match token_transition(token.state, op) {
            Transition::Rejected => Err(LifecycleError::TokenRevoked(token.id.clone())),
            _ => Ok(()),
        }
    }

    /// Apply a primitive to `token` in memory and audit it. Exactly one
    /// audit entry on success, none on failure.
    pub(crate) fn apply_op(
        &self,
        token: &mut TokenRecord,
        op: TokenOp,
        actor: &str,
        reason: &str,
        now: Timestamp,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let previous = token.state;
        let (next, action) = match token_transition(previous, op) {
            Transition::Move(next) => (next, op.action()),
            Transition::Noop => (previous, op.noop_action()),
            Transition::Rejected => {
                warn!(token = %token.id, op = op.as_str(), "rejected: token is revoked");
                return Err(LifecycleError::TokenRevoked(token.id.clone()));
            }
        };

        let entry = NewAuditEntry::new(now, action, actor, token.id.as_str(), reason)
            .with_detail(json!({ "from": previous, "to": next }));
        let sealed = self.record(token, entry)?;

        if next != previous {
            token.state = next;
            token.reason = Some(reason.to_string());
            token.updated_at = now;
            info!(token = %token.id, from = %previous, to = %next, actor, reason, "token transition");
            outbox.emit(LifecycleEvent::TokenTransitioned {
                token_id: token.id.clone(),
                merchant_id: token.merchant_id.clone(),
                from: previous,
                to: next,
                reason: reason.to_string(),
            });
            outbox.notify(
                token.merchant_id.clone(),
                Notification::TokenStateChanged {
                    token_id: token.id.clone(),
                    state: next,
                    reason: reason.to_string(),
                },
            );
        } else {
            debug!(token = %token.id, action = %action, "idempotent no-op");
        }

        Ok(TransitionOutcome {
            token_id: token.id.clone(),
            previous,
            state: next,
            action,
            audit_seq: sealed.seq,
        })
    }

    /// Close the token's open event if its deadline has passed, and drop a
    /// stale open-event link. Returns whether `token` changed and must be
    /// persisted.
    pub(crate) fn reconcile_locked(
        &self,
        token: &mut TokenRecord,
        now: Timestamp,
        outbox: &mut Outbox,
    ) -> Result<bool, LifecycleError> {
        let Some(event_id) = token.open_event.clone() else {
            return Ok(false);
        };
        let event = match self.stores.events.get_event(&event_id)? {
            Some(event) if event.status.is_open() => event,
            _ => {
                warn!(token = %token.id, event = %event_id, "clearing stale open-event link");
                token.open_event = None;
                return Ok(true);
            }
        };
        if !event.is_overdue(now) {
            return Ok(false);
        }
        self.expire_locked(token, event, now, outbox)?;
        Ok(true)
    }

    /// Deadline rule: an overdue `waiting_verification` event fails and its
    /// token is revoked. Persists the event; the caller persists the token.
    pub(crate) fn expire_locked(
        &self,
        token: &mut TokenRecord,
        mut event: EventRecord,
        now: Timestamp,
        outbox: &mut Outbox,
    ) -> Result<EventRecord, LifecycleError> {
        event.status = EventStatus::VerifiedFailure;
        event.verification = Some(VerificationRecord {
            verified: false,
            method: "timeout".into(),
            responder: None,
            evidence: None,
            at: now,
        });
        event.updated_at = now;

        let entry = NewAuditEntry::new(
            now,
            AuditAction::VerifyTimeout,
            SYSTEM_ACTOR,
            event.id.as_str(),
            "verification window expired",
        )
        .with_detail(json!({ "token_id": token.id, "deadline": event.deadline }));
        self.stores.events.put_event(&event)?;
        self.record(token, entry)?;

        if token.open_event.as_ref() == Some(&event.id) {
            token.open_event = None;
        }
        self.apply_op(
            token,
            TokenOp::Revoke,
            SYSTEM_ACTOR,
            "verification timeout",
            now,
            outbox,
        )?;

        info!(event = %event.id, token = %token.id, "verification window expired");
        outbox.emit(LifecycleEvent::VerificationCompleted {
            event_id: event.id.clone(),
            token_id: token.id.clone(),
            merchant_id: event.merchant_id.clone(),
            result: VerificationResult::Timeout,
        });
        Ok(event)
    }
}
