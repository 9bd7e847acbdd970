//! Token issuance and risk analysis.

use crate::events::LifecycleEvent;
use crate::lifecycle::{Outbox, TokenLifecycle, RISK_ENGINE_ACTOR, SYSTEM_ACTOR};
use crate::notify::Notification;
use crate::transition::TokenOp;
use crate::LifecycleError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::PoisonError;
use tokentrust_risk::{classify, OracleError, TransactionContext};
use tokentrust_store::{AuditAction, EventRecord, NewAuditEntry, TokenRecord};
use tokentrust_types::{
    Decision, EventId, EventStatus, MerchantId, RiskScore, RiskTier, Timestamp, TokenId,
    TokenState,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub merchant_id: MerchantId,
    pub customer_id: String,
    pub payment_reference: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssueOutcome {
    pub token: TokenRecord,
    /// False when an earlier token was returned for the same idempotency key.
    pub created: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub token_id: TokenId,
    pub merchant_id: MerchantId,
    pub amount: u64,
    pub risk_score: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Analysis request without a score; the configured oracle supplies it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OracleAnalyzeRequest {
    pub token_id: TokenId,
    pub merchant_id: MerchantId,
    pub amount: u64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalyzeOutcome {
    pub event_id: EventId,
    pub token_id: TokenId,
    pub risk_score: u8,
    pub tier: RiskTier,
    pub decision: Decision,
    pub event_status: EventStatus,
    pub token_state: TokenState,
    pub auto_revoke_candidate: bool,
    pub deadline: Option<Timestamp>,
    pub explanation: Option<String>,
}

impl TokenLifecycle {
    /// Issue an `active` token. Idempotent per `(merchant, idempotency_key)`:
    /// a repeat returns the original token and records nothing.
    pub fn issue_token(&self, req: IssueRequest) -> Result<IssueOutcome, LifecycleError> {
        let issuing = self.issue_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = self.stores.tokens.find_by_idempotency(&req.merchant_id, key)? {
                debug!(token = %existing.id, merchant = %req.merchant_id, "idempotent issue replay");
                return Ok(IssueOutcome {
                    token: existing,
                    created: false,
                });
            }
        }

        let now = self.now();
        let mut token = TokenRecord {
            id: TokenId::generate(),
            merchant_id: req.merchant_id,
            customer_id: req.customer_id,
            payment_reference: req.payment_reference,
            amount: req.amount,
            currency: req.currency,
            state: TokenState::Active,
            issued_at: now,
            expires_at: now.plus_secs(self.params.token_ttl_secs),
            updated_at: now,
            idempotency_key: req.idempotency_key,
            reason: None,
            auto_revoke_candidate: false,
            open_event: None,
            history: Vec::new(),
        };

        let entry = NewAuditEntry::new(
            now,
            AuditAction::Issue,
            SYSTEM_ACTOR,
            token.id.as_str(),
            "token issued",
        )
        .with_detail(json!({
            "merchant_id": token.merchant_id,
            "customer_id": token.customer_id,
            "payment_reference": token.payment_reference,
            "amount": token.amount,
            "currency": token.currency,
            "expires_at": token.expires_at,
        }));
        self.stores.tokens.put_token(&token)?;
        self.record(&mut token, entry)?;
        self.stores.tokens.put_token(&token)?;
        drop(issuing);

        info!(token = %token.id, merchant = %token.merchant_id, amount = token.amount, "token issued");

        let mut outbox = Outbox::default();
        outbox.emit(LifecycleEvent::TokenIssued {
            token_id: token.id.clone(),
            merchant_id: token.merchant_id.clone(),
        });
        outbox.notify(
            token.merchant_id.clone(),
            Notification::TokenAssigned {
                token_id: token.id.clone(),
                customer_id: token.customer_id.clone(),
                amount: token.amount,
                currency: token.currency.clone(),
                expires_at: token.expires_at,
            },
        );
        self.deliver(outbox);

        Ok(IssueOutcome {
            token,
            created: true,
        })
    }

    /// Classify a score and apply the default action to the token.
    ///
    /// `approve` leaves the token untouched. A challenge freezes it, opens a
    /// verification window and notifies the merchant; it fails with
    /// `VerificationPending` while another window is still open.
    pub fn analyze(&self, req: AnalyzeRequest) -> Result<AnalyzeOutcome, LifecycleError> {
        let token_id = req.token_id.clone();
        self.with_token_lock(&token_id, |outbox| self.analyze_locked(req, outbox))
    }

    /// Ask the configured oracle for a score, then [`analyze`](Self::analyze).
    ///
    /// An oracle failure or an out-of-range score is replaced by the
    /// configured fallback score, and the event explanation says so.
    pub fn analyze_with_oracle(
        &self,
        req: OracleAnalyzeRequest,
        ctx: &TransactionContext,
    ) -> Result<AnalyzeOutcome, LifecycleError> {
        let ctx = TransactionContext {
            amount: req.amount,
            ..ctx.clone()
        };
        let assessed = self.oracle.assess(&ctx).and_then(|a| {
            if RiskScore::new(a.score).is_some() {
                Ok(a)
            } else {
                Err(OracleError::OutOfRange(a.score))
            }
        });

        let (risk_score, explanation) = match assessed {
            Ok(a) => (a.score, a.explanation),
            Err(e) => {
                let fallback = self.params.oracle_fallback_score;
                warn!(
                    oracle = self.oracle.name(),
                    token = %req.token_id,
                    error = %e,
                    fallback,
                    "risk oracle failed; applying fallback score"
                );
                (
                    i64::from(fallback),
                    format!(
                        "oracle {} failed ({e}); applied fallback score {fallback}",
                        self.oracle.name()
                    ),
                )
            }
        };

        self.analyze(AnalyzeRequest {
            token_id: req.token_id,
            merchant_id: req.merchant_id,
            amount: req.amount,
            risk_score,
            metadata: req.metadata,
            explanation: Some(explanation),
        })
    }

    fn analyze_locked(
        &self,
        req: AnalyzeRequest,
        outbox: &mut Outbox,
    ) -> Result<AnalyzeOutcome, LifecycleError> {
        let now = self.now();
        let mut token = self.load_token(&req.token_id)?;
        if token.merchant_id != req.merchant_id {
            warn!(token = %token.id, merchant = %req.merchant_id, "analysis rejected: merchant mismatch");
            return Err(LifecycleError::MerchantMismatch {
                token: token.id,
                merchant: req.merchant_id,
            });
        }
        if self.reconcile_locked(&mut token, now, outbox)? {
            self.stores.tokens.put_token(&token)?;
        }
        if token.state.is_terminal() {
            warn!(token = %token.id, "analysis rejected: token is revoked");
            return Err(LifecycleError::TokenRevoked(token.id));
        }

        let class = classify(req.risk_score, &self.params.thresholds)?;
        let challenge = class.decision.is_challenge();
        if challenge {
            if let Some(open) = &token.open_event {
                warn!(token = %token.id, event = %open, "analysis rejected: verification pending");
                return Err(LifecycleError::VerificationPending {
                    token: token.id.clone(),
                    event: open.clone(),
                });
            }
        }

        let deadline = challenge.then(|| now.plus_secs(self.params.verification_timeout_secs));
        let event = EventRecord {
            id: EventId::generate(),
            token_id: token.id.clone(),
            merchant_id: token.merchant_id.clone(),
            amount: req.amount,
            risk_score: class.score,
            tier: class.tier,
            decision: class.decision,
            status: if challenge {
                EventStatus::WaitingVerification
            } else {
                EventStatus::Approved
            },
            auto_revoke_candidate: class.auto_revoke_candidate(),
            explanation: req.explanation,
            metadata: req.metadata,
            deadline,
            verification: None,
            triage: None,
            created_at: now,
            updated_at: now,
        };

        let entry = NewAuditEntry::new(
            now,
            AuditAction::Analyze,
            RISK_ENGINE_ACTOR,
            event.id.as_str(),
            format!("risk score {} classified {}", class.score, class.tier),
        )
        .with_detail(json!({
            "token_id": token.id,
            "amount": event.amount,
            "risk_score": class.score,
            "tier": class.tier,
            "decision": class.decision,
        }));
        self.stores.events.put_event(&event)?;
        self.record(&mut token, entry)?;
        outbox.emit(LifecycleEvent::EventAnalyzed {
            event_id: event.id.clone(),
            token_id: token.id.clone(),
            merchant_id: event.merchant_id.clone(),
            decision: class.decision,
            tier: class.tier,
            score: class.score.value(),
        });

        if let Some(deadline) = deadline {
            let reason = format!("{} risk score {}", class.tier, class.score);
            self.apply_op(&mut token, TokenOp::Freeze, RISK_ENGINE_ACTOR, &reason, now, outbox)?;
            token.open_event = Some(event.id.clone());
            if class.auto_revoke_candidate() {
                token.auto_revoke_candidate = true;
            }
            info!(
                token = %token.id,
                event = %event.id,
                score = class.score.value(),
                decision = %class.decision,
                deadline = %deadline,
                "verification requested"
            );
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
                    risk_score: class.score.value(),
                    tier: class.tier,
                    deadline,
                    explanation: event.explanation.clone(),
                },
            );
        } else {
            info!(token = %token.id, event = %event.id, score = class.score.value(), "approved");
        }

        self.stores.tokens.put_token(&token)?;

        Ok(AnalyzeOutcome {
            event_id: event.id,
            token_id: token.id,
            risk_score: class.score.value(),
            tier: class.tier,
            decision: class.decision,
            event_status: event.status,
            token_state: token.state,
            auto_revoke_candidate: event.auto_revoke_candidate,
            deadline,
            explanation: event.explanation,
        })
    }
}
