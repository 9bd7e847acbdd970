//! Transition tables for tokens and events.
//!
//! Token primitives are idempotent: applying an operation to a token already
//! in the target state is a no-op (still audited), and nothing leaves
//! `revoked`.

use tokentrust_store::AuditAction;
use tokentrust_types::{EventStatus, TokenState};

/// A token primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOp {
    Freeze,
    Unfreeze,
    Revoke,
}

impl TokenOp {
    pub const ALL: [TokenOp; 3] = [Self::Freeze, Self::Unfreeze, Self::Revoke];

    /// Audit action recorded when the operation changes state.
    pub fn action(&self) -> AuditAction {
        match self {
            Self::Freeze => AuditAction::Freeze,
            Self::Unfreeze => AuditAction::Unfreeze,
            Self::Revoke => AuditAction::Revoke,
        }
    }

    /// Audit action recorded when the operation is a no-op.
    pub fn noop_action(&self) -> AuditAction {
        match self {
            Self::Freeze => AuditAction::FreezeNoop,
            Self::Unfreeze => AuditAction::UnfreezeNoop,
            Self::Revoke => AuditAction::RevokeNoop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Freeze => "freeze",
            Self::Unfreeze => "unfreeze",
            Self::Revoke => "revoke",
        }
    }
}

/// Result of looking up `(state, op)` in the token table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Move(TokenState),
    Noop,
    /// The token is revoked and the operation would leave `revoked`.
    Rejected,
}

/// | state \ op | freeze   | unfreeze | revoke   |
/// |------------|----------|----------|----------|
/// | active     | → frozen | no-op    | → revoked|
/// | frozen     | no-op    | → active | → revoked|
/// | revoked    | rejected | rejected | no-op    |
pub fn token_transition(state: TokenState, op: TokenOp) -> Transition {
    use TokenOp::*;
    use TokenState::*;
    match (state, op) {
        (Active, Freeze) => Transition::Move(Frozen),
        (Active, Unfreeze) => Transition::Noop,
        (Active, Revoke) => Transition::Move(Revoked),
        (Frozen, Freeze) => Transition::Noop,
        (Frozen, Unfreeze) => Transition::Move(Active),
        (Frozen, Revoke) => Transition::Move(Revoked),
        (Revoked, Revoke) => Transition::Noop,
        (Revoked, Freeze | Unfreeze) => Transition::Rejected,
    }
}

/// Whether an event may move from `from` to `to`.
///
/// `approved` may be reopened by triage; `waiting_verification` may be
/// refreshed in place; the three outcomes are final.
pub fn event_transition_allowed(from: EventStatus, to: EventStatus) -> bool {
    use EventStatus::*;
    match from {
        Approved => matches!(to, WaitingVerification | AgentOverridden),
        WaitingVerification => matches!(
            to,
            WaitingVerification | VerifiedSuccess | VerifiedFailure | AgentOverridden
        ),
        VerifiedSuccess | VerifiedFailure | AgentOverridden => false,
    }
}
