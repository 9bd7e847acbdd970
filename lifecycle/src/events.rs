//! Events emitted by the lifecycle core for in-process observers.

use tokentrust_types::{
    AgentDecision, Decision, EventId, MerchantId, RiskTier, Timestamp, TokenId, TokenState,
};

/// How a verification window was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerificationResult {
    Success,
    Failure,
    Timeout,
}

impl VerificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

/// Lifecycle-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    /// A new token was issued.
    TokenIssued {
        token_id: TokenId,
        merchant_id: MerchantId,
    },
    /// A primitive moved a token between states. No-ops are not reported.
    TokenTransitioned {
        token_id: TokenId,
        merchant_id: MerchantId,
        from: TokenState,
        to: TokenState,
        reason: String,
    },
    /// A risk analysis created an event.
    EventAnalyzed {
        event_id: EventId,
        token_id: TokenId,
        merchant_id: MerchantId,
        decision: Decision,
        tier: RiskTier,
        score: u8,
    },
    /// An event entered `waiting_verification`.
    VerificationRequested {
        event_id: EventId,
        token_id: TokenId,
        merchant_id: MerchantId,
        deadline: Timestamp,
    },
    /// A `waiting_verification` event reached an outcome.
    VerificationCompleted {
        event_id: EventId,
        token_id: TokenId,
        merchant_id: MerchantId,
        result: VerificationResult,
    },
    /// A triage decision was applied.
    Triaged {
        event_id: EventId,
        token_id: TokenId,
        merchant_id: MerchantId,
        decision: AgentDecision,
        /// The event was waiting for verification and no longer is.
        closed_verification: bool,
    },
}

impl LifecycleEvent {
    pub fn merchant_id(&self) -> &MerchantId {
        match self {
            Self::TokenIssued { merchant_id, .. }
            | Self::TokenTransitioned { merchant_id, .. }
            | Self::EventAnalyzed { merchant_id, .. }
            | Self::VerificationRequested { merchant_id, .. }
            | Self::VerificationCompleted { merchant_id, .. }
            | Self::Triaged { merchant_id, .. } => merchant_id,
        }
    }
}

/// Synchronous fan-out event bus.
///
/// Listeners run inline on the calling thread after the token lock has been
/// released; keep handlers fast.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&LifecycleEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LifecycleEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &LifecycleEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
