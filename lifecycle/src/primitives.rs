//! Idempotent token primitives.
//!
//! A lapsed verification window is closed before the primitive applies, so
//! `unfreeze` on a token whose window ran out fails with `TokenRevoked`.

use crate::lifecycle::{TokenLifecycle, TransitionOutcome};
use crate::transition::TokenOp;
use crate::LifecycleError;
use tokentrust_types::TokenId;

impl TokenLifecycle {
    /// active → frozen; no-op when already frozen.
    pub fn freeze(
        &self,
        token: &TokenId,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.primitive(token, TokenOp::Freeze, actor, reason)
    }

    /// frozen → active; no-op when already active.
    pub fn unfreeze(
        &self,
        token: &TokenId,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.primitive(token, TokenOp::Unfreeze, actor, reason)
    }

    /// active | frozen → revoked; no-op when already revoked.
    pub fn revoke(
        &self,
        token: &TokenId,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.primitive(token, TokenOp::Revoke, actor, reason)
    }

    fn primitive(
        &self,
        id: &TokenId,
        op: TokenOp,
        actor: &str,
        reason: &str,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.with_token_lock(id, |outbox| {
            let now = self.now();
            let mut token = self.load_token(id)?;
            if self.reconcile_locked(&mut token, now, outbox)? {
                self.stores.tokens.put_token(&token)?;
            }
            let outcome = self.apply_op(&mut token, op, actor, reason, now, outbox)?;
            self.stores.tokens.put_token(&token)?;
            Ok(outcome)
        })
    }
}
