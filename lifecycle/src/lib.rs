//! Risk-driven token lifecycle for TokenTrust.
//!
//! [`TokenLifecycle`] is the single entry point. It classifies risk scores,
//! drives tokens through `active ⇄ frozen → revoked`, runs the time-bounded
//! verification workflow, applies triage overrides and records every
//! state-affecting call in the audit log.
//!
//! All operations are synchronous. Mutations of a token and of its events
//! are serialised by a per-token lock; independent tokens never contend.

pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod locks;
pub mod notify;
pub mod primitives;
pub mod queries;
pub mod transition;
pub mod workflow;

pub use engine::{AnalyzeOutcome, AnalyzeRequest, IssueOutcome, IssueRequest, OracleAnalyzeRequest};
pub use error::LifecycleError;
pub use events::{EventBus, LifecycleEvent, VerificationResult};
pub use lifecycle::{
    Stores, TokenLifecycle, TransitionOutcome, MERCHANT_ACTOR, RISK_ENGINE_ACTOR, SYSTEM_ACTOR,
    TRIAGE_ACTOR,
};
pub use locks::TokenLocks;
pub use notify::{Notification, Notifier, NotifyError};
pub use queries::{LifecycleStats, TokenStatus, DEFAULT_AUDIT_LIMIT, MAX_MERCHANT_TOKENS};
pub use transition::{token_transition, TokenOp, Transition};
pub use workflow::{TriageOutcome, TriageRequest, VerificationOutcome, VerificationSubmission};
