//! Verification sub-workflow: merchant responses, deadline expiry and
//! triage overrides.

use crate::events::{LifecycleEvent, VerificationResult};
use crate::lifecycle::{Outbox, TokenLifecycle, MERCHANT_ACTOR, TRIAGE_ACTOR};
use crate::notify::Notification;
use crate::transition::{event_transition_allowed, TokenOp};
use crate::LifecycleError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokentrust_store::{AuditAction, NewAuditEntry, TriageRecord, VerificationRecord};
use tokentrust_types::{AgentDecision, EventId, EventStatus, Timestamp, TokenId, TokenState};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerificationSubmission {
    pub event_id: EventId,
    pub verified: bool,
    /// How the merchant collected the response (`otp`, `call`, ...).
    pub method: String,
    #[serde(default)]
    pub responder: Option<String>,
    #[serde(default)]
    pub evidence: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub event_id: EventId,
    pub token_id: TokenId,
    pub event_status: EventStatus,
    pub token_state: TokenState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRequest {
    pub event_id: EventId,
    pub decision: AgentDecision,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TriageOutcome {
    pub event_id: EventId,
    pub token_id: TokenId,
    pub decision: AgentDecision,
    pub event_status: EventStatus,
    pub token_state: TokenState,
    pub auto_revoke_candidate: bool,
    pub deadline: Option<Timestamp>,
}

impl TokenLifecycle {
    /// Record the merchant's answer for a `waiting_verification` event.
    ///
    /// The first response wins. A response after the deadline is rejected
    /// with `VerificationExpired`, and the expiry is committed by the same
    /// call.
    pub fn submit_verification(
        &self,
        sub: VerificationSubmission,
    ) -> Result<VerificationOutcome, LifecycleError> {
        let token_id = self.load_event(&sub.event_id)?.token_id;
        self.with_token_lock(&token_id, |outbox| {
            self.submit_locked(&token_id, sub, outbox)
        })
    }

    fn submit_locked(
        &self,
        token_id: &TokenId,
        sub: VerificationSubmission,
        outbox: &mut Outbox,
    ) -> Result<VerificationOutcome, LifecycleError> {
        let now = self.now();
        let mut event = self.load_event(&sub.event_id)?;
        let mut token = self.load_token(token_id)?;

        if event.is_overdue(now) {
            let deadline = event.deadline.unwrap_or(now);
            self.expire_locked(&mut token, event, now, outbox)?;
            self.stores.tokens.put_token(&token)?;
            warn!(event = %sub.event_id, deadline = %deadline, "late verification response rejected");
            return Err(LifecycleError::VerificationExpired {
                event: sub.event_id,
                deadline,
            });
        }
        if !event.status.is_open() {
            warn!(event = %event.id, status = %event.status, "verification response for closed event");
            return Err(LifecycleError::EventNotOpen {
                event: event.id,
                status: event.status,
            });
        }

        let (status, action, op, result, reason) = if sub.verified {
            (
                EventStatus::VerifiedSuccess,
                AuditAction::VerifySuccess,
                TokenOp::Unfreeze,
                VerificationResult::Success,
                "merchant verified the transaction",
            )
        } else {
            (
                EventStatus::VerifiedFailure,
                AuditAction::VerifyFailure,
                TokenOp::Revoke,
                VerificationResult::Failure,
                "merchant rejected the transaction",
            )
        };
        Self::ensure_allowed(&token, op)?;
        debug_assert!(event_transition_allowed(event.status, status));

        let actor = sub
            .responder
            .clone()
            .unwrap_or_else(|| MERCHANT_ACTOR.to_string());
        event.status = status;
        event.verification = Some(VerificationRecord {
            verified: sub.verified,
            method: sub.method.clone(),
            responder: sub.responder,
            evidence: sub.evidence.clone(),
            at: now,
        });
        event.updated_at = now;

        let entry = NewAuditEntry::new(
            now,
            action,
            actor.as_str(),
            event.id.as_str(),
            format!("verification via {}", sub.method),
        )
        .with_detail(json!({
            "token_id": token.id,
            "verified": sub.verified,
            "method": sub.method,
            "evidence": sub.evidence,
        }));
        self.stores.events.put_event(&event)?;
        self.record(&mut token, entry)?;

        if token.open_event.as_ref() == Some(&event.id) {
            token.open_event = None;
        }
        self.apply_op(&mut token, op, &actor, reason, now, outbox)?;
        self.stores.tokens.put_token(&token)?;

        info!(event = %event.id, token = %token.id, outcome = result.as_str(), "verification recorded");
        outbox.emit(LifecycleEvent::VerificationCompleted {
            event_id: event.id.clone(),
            token_id: token.id.clone(),
            merchant_id: event.merchant_id.clone(),
            result,
        });

        Ok(VerificationOutcome {
            event_id: event.id,
            token_id: token.id,
            event_status: event.status,
            token_state: token.state,
        })
    }

    /// Apply the deadline rule to one event. Returns whether it expired now.
    pub fn expire_if_due(&self, event_id: &EventId) -> Result<bool, LifecycleError> {
        let token_id = self.load_event(event_id)?.token_id;
        self.with_token_lock(&token_id, |outbox| {
            let now = self.now();
            let event = self.load_event(event_id)?;
            if !event.is_overdue(now) {
                return Ok(false);
            }
            let mut token = self.load_token(&token_id)?;
            self.expire_locked(&mut token, event, now, outbox)?;
            self.stores.tokens.put_token(&token)?;
            Ok(true)
        })
    }

    /// Expire every overdue verification window. Returns how many expired.
    ///
    /// A failure on one event is logged and does not stop the sweep.
    pub fn sweep_expired(&self) -> Result<usize, LifecycleError> {
        let now = self.now();
        let due: Vec<EventId> = self
            .stores
            .events
            .open_events()?
            .into_iter()
            .filter(|e| e.is_overdue(now))
            .map(|e| e.id)
            .collect();

        let mut expired = 0;
        for id in due {
            match self.expire_if_due(&id) {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => warn!(event = %id, error = %e, "failed to expire event"),
            }
        }
        if expired > 0 {
            info!(expired, "expired overdue verification windows");
        }
        Ok(expired)
    }

    /// Replace the default policy for an event with an external decision.
    ///
    /// - `approve`: event → `agent_overridden`; the token is unfrozen if this
    ///   was its open verification.
    /// - `challenge` / `challenge_high`: event (re)enters
    ///   `waiting_verification` with a fresh deadline and the token is frozen.
    /// - `revoke`: event → `agent_overridden`; the token is revoked.
    ///
    /// Terminal events are closed to triage.
    pub fn triage(&self, req: TriageRequest) -> Result<TriageOutcome, LifecycleError> {
        let token_id = self.load_event(&req.event_id)?.token_id;
        self.with_token_lock(&token_id, |outbox| {
            self.triage_locked(&token_id, req, outbox)
        })
    }

    fn triage_locked(
        &self,
        token_id: &TokenId,
        req: TriageRequest,
        outbox: &mut Outbox,
    ) -> Result<TriageOutcome, LifecycleError> {
        let now = self.now();
        let mut token = self.load_token(token_id)?;
        let mut dirty = self.reconcile_locked(&mut token, now, outbox)?;
        let mut event = self.load_event(&req.event_id)?;
        if event.is_overdue(now) {
            event = self.expire_locked(&mut token, event, now, outbox)?;
            dirty = true;
        }
        if dirty {
            self.stores.tokens.put_token(&token)?;
        }

        if event.status.is_terminal() {
            warn!(event = %event.id, status = %event.status, "triage rejected: event is terminal");
            return Err(LifecycleError::EventAlreadyTerminal {
                event: event.id,
                status: event.status,
            });
        }

        let previous_status = event.status;
        let was_open = previous_status.is_open();
        let owns_window = token.open_event.as_ref() == Some(&event.id);
        let actor = req.actor.clone().unwrap_or_else(|| TRIAGE_ACTOR.to_string());

        let (status, op) = match req.decision {
            AgentDecision::Approve => (
                EventStatus::AgentOverridden,
                owns_window.then_some(TokenOp::Unfreeze),
            ),
            AgentDecision::Challenge | AgentDecision::ChallengeHigh => {
                if !was_open {
                    if let Some(open) = &token.open_event {
                        return Err(LifecycleError::VerificationPending {
                            token: token.id.clone(),
                            event: open.clone(),
                        });
                    }
                }
                (EventStatus::WaitingVerification, Some(TokenOp::Freeze))
            }
            AgentDecision::Revoke => (EventStatus::AgentOverridden, Some(TokenOp::Revoke)),
        };
        if let Some(op) = op {
            Self::ensure_allowed(&token, op)?;
        }
        debug_assert!(event_transition_allowed(previous_status, status));

        event.status = status;
        event.triage = Some(TriageRecord {
            decision: req.decision,
            reasoning: req.reasoning.clone(),
            at: now,
        });
        event.updated_at = now;
        if status.is_open() {
            event.deadline = Some(now.plus_secs(self.params.verification_timeout_secs));
            if req.decision == AgentDecision::ChallengeHigh {
                event.auto_revoke_candidate = true;
                token.auto_revoke_candidate = true;
            }
        }

        let entry = NewAuditEntry::new(
            now,
            AuditAction::Triage,
            actor.as_str(),
            event.id.as_str(),
            req.reasoning.as_str(),
        )
        .with_detail(json!({
            "token_id": token.id,
            "decision": req.decision,
            "previous_status": previous_status,
            "status": status,
        }));
        self.stores.events.put_event(&event)?;
        self.record(&mut token, entry)?;

        if status.is_open() {
            token.open_event = Some(event.id.clone());
        } else if owns_window {
            token.open_event = None;
        }
        if let Some(op) = op {
            let reason = format!("triage decision {}", req.decision);
            self.apply_op(&mut token, op, &actor, &reason, now, outbox)?;
        }
        self.stores.tokens.put_token(&token)?;

        info!(
            event = %event.id,
            token = %token.id,
            decision = %req.decision,
            from = %previous_status,
            to = %status,
            "triage applied"
        );
        if status.is_open() && !was_open {
            if let Some(deadline) = event.deadline {
                outbox.emit(LifecycleEvent::VerificationRequested {
                    event_id: event.id.clone(),
                    token_id: token.id.clone(),
                    merchant_id: event.merchant_id.clone(),
                    deadline,
                });
                outbox.notify(
                    token.merchant_id.clone(),
                    Notification::VerificationRequested {
                        event_id: event.id.clone(),
                        token_id: token.id.clone(),
                        amount: event.amount,
                        risk_score: event.risk_score.value(),
                        tier: event.tier,
                        deadline,
                        explanation: event.explanation.clone(),
                    },
                );
            }
        }
        outbox.emit(LifecycleEvent::Triaged {
            event_id: event.id.clone(),
            token_id: token.id.clone(),
            merchant_id: event.merchant_id.clone(),
            decision: req.decision,
            closed_verification: was_open && !status.is_open(),
        });

        Ok(TriageOutcome {
            event_id: event.id,
            token_id: token.id,
            decision: req.decision,
            event_status: event.status,
            token_state: token.state,
            auto_revoke_candidate: event.auto_revoke_candidate,
            deadline: event.deadline,
        })
    }
}
