//! Shared wiring for the lifecycle integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokentrust_lifecycle::{
    AnalyzeOutcome, AnalyzeRequest, IssueRequest, LifecycleEvent, TokenLifecycle,
};
use tokentrust_nullables::{null_stores, NullClock, NullNotifier};
use tokentrust_store::{AuditAction, TokenRecord};
use tokentrust_types::{LifecycleParams, MerchantId, TokenId};

pub const START: u64 = 1_700_000_000;
pub const MERCHANT: &str = "merchant_42";

pub struct Harness {
    pub lifecycle: Arc<TokenLifecycle>,
    pub clock: Arc<NullClock>,
    pub notifier: Arc<NullNotifier>,
    pub bus_events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

pub fn harness() -> Harness {
    harness_with(|l| l)
}

/// Build a harness, letting the caller adjust the core before it is shared.
pub fn harness_with(configure: impl FnOnce(TokenLifecycle) -> TokenLifecycle) -> Harness {
    let clock = Arc::new(NullClock::new(START));
    let notifier = Arc::new(NullNotifier::new());
    let bus_events = Arc::new(Mutex::new(Vec::new()));

    let mut lifecycle = TokenLifecycle::new(null_stores(), clock.clone(), LifecycleParams::default())
        .expect("default params are valid")
        .with_notifier(notifier.clone());
    let sink = Arc::clone(&bus_events);
    lifecycle.subscribe(Box::new(move |e| sink.lock().unwrap().push(e.clone())));
    let lifecycle = configure(lifecycle);

    Harness {
        lifecycle: Arc::new(lifecycle),
        clock,
        notifier,
        bus_events,
    }
}

impl Harness {
    pub fn issue(&self) -> TokenRecord {
        self.lifecycle
            .issue_token(IssueRequest {
                merchant_id: MerchantId::new(MERCHANT),
                customer_id: "cust_7".into(),
                payment_reference: "order-1001".into(),
                amount: 125_000,
                currency: "INR".into(),
                idempotency_key: None,
            })
            .expect("issue")
            .token
    }

    pub fn analyze(&self, token: &TokenId, score: i64) -> AnalyzeOutcome {
        self.try_analyze(token, score).expect("analyze")
    }

    pub fn try_analyze(
        &self,
        token: &TokenId,
        score: i64,
    ) -> Result<AnalyzeOutcome, tokentrust_lifecycle::LifecycleError> {
        self.lifecycle.analyze(AnalyzeRequest {
            token_id: token.clone(),
            merchant_id: MerchantId::new(MERCHANT),
            amount: 125_000,
            risk_score: score,
            metadata: serde_json::json!({ "channel": "web" }),
            explanation: None,
        })
    }

    /// Audit actions recorded against `target`, oldest first.
    pub fn actions(&self, target: &str) -> Vec<AuditAction> {
        self.lifecycle
            .audit_for(target, Some(1_000))
            .expect("audit")
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    pub fn audit_len(&self) -> u64 {
        self.lifecycle.stats().expect("stats").audit_entries
    }
}
