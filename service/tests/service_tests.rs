use std::sync::Arc;

use tokentrust_lifecycle::{AnalyzeRequest, IssueRequest, VerificationSubmission};
use tokentrust_nullables::NullClock;
use tokentrust_service::{ServiceConfig, ServiceError, ShutdownReason, TokenTrustService};
use tokentrust_types::{MerchantId, TokenId};
use tokentrust_websocket::SubscriptionEvent;

const START: u64 = 1_700_000_000;

fn service(config: ServiceConfig) -> (TokenTrustService, Arc<NullClock>) {
    let clock = Arc::new(NullClock::new(START));
    let service = TokenTrustService::with_clock(config, clock.clone()).expect("valid config");
    (service, clock)
}

fn issue(service: &TokenTrustService) -> TokenId {
    service
        .lifecycle()
        .issue_token(IssueRequest {
            merchant_id: MerchantId::new("m1"),
            customer_id: "c1".into(),
            payment_reference: "order-1".into(),
            amount: 2_500,
            currency: "INR".into(),
            idempotency_key: None,
        })
        .unwrap()
        .token
        .id
}

fn analyze(service: &TokenTrustService, token: &TokenId, score: i64) -> tokentrust_lifecycle::AnalyzeOutcome {
    service
        .lifecycle()
        .analyze(AnalyzeRequest {
            token_id: token.clone(),
            merchant_id: MerchantId::new("m1"),
            amount: 2_500,
            risk_score: score,
            metadata: serde_json::Value::Null,
            explanation: None,
        })
        .unwrap()
}

#[test]
fn notifications_reach_websocket_topics() {
    let (service, _clock) = service(ServiceConfig::default());
    let ws = service.ws_state().expect("websocket enabled by default");
    let mut tokens = ws.tokens_tx.subscribe();
    let mut verification = ws.verification_tx.subscribe();

    let token = issue(&service);
    let assigned: SubscriptionEvent = serde_json::from_str(&tokens.try_recv().unwrap()).unwrap();
    assert_eq!(assigned.event, "token.assigned");
    assert_eq!(assigned.merchant_id, "m1");

    let outcome = analyze(&service, &token, 65);
    let requested: SubscriptionEvent =
        serde_json::from_str(&verification.try_recv().unwrap()).unwrap();
    assert_eq!(requested.event, "verification.requested");
    let frozen: SubscriptionEvent = serde_json::from_str(&tokens.try_recv().unwrap()).unwrap();
    assert_eq!(frozen.event, "token.frozen");

    service
        .lifecycle()
        .submit_verification(VerificationSubmission {
            event_id: outcome.event_id,
            verified: true,
            method: "otp".into(),
            responder: None,
            evidence: None,
        })
        .unwrap();
    let completed: SubscriptionEvent =
        serde_json::from_str(&verification.try_recv().unwrap()).unwrap();
    assert_eq!(completed.event, "verification.completed");
    assert_eq!(completed.data["result"], "success");
}

#[test]
fn metrics_follow_the_event_bus() {
    let (service, _clock) = service(ServiceConfig::default());
    let token = issue(&service);
    analyze(&service, &token, 20);
    analyze(&service, &token, 90);

    let metrics = service.metrics();
    assert_eq!(metrics.tokens_issued.get(), 1);
    assert_eq!(metrics.analyses.with_label_values(&["approve"]).get(), 1);
    assert_eq!(metrics.analyses.with_label_values(&["challenge_high"]).get(), 1);
    assert_eq!(metrics.freezes.get(), 1);
    assert_eq!(metrics.verifications_requested.get(), 1);
}

#[test]
fn websocket_can_be_disabled() {
    let config = ServiceConfig {
        enable_websocket: false,
        ..Default::default()
    };
    let (service, _clock) = service(config);
    assert!(service.ws_state().is_none());

    let token = issue(&service);
    assert_eq!(analyze(&service, &token, 65).decision.as_str(), "challenge");
}

#[test]
fn lifecycle_table_drives_thresholds() {
    let config = ServiceConfig::from_toml_str(
        r#"
        [lifecycle]
        approve_max = 69
        medium_max = 89
        "#,
    )
    .unwrap();
    let (service, _clock) = service(config);
    let token = issue(&service);
    assert_eq!(analyze(&service, &token, 65).decision.as_str(), "approve");
}

#[test]
fn invalid_config_is_rejected() {
    let config = ServiceConfig {
        ws_channel_capacity: 0,
        ..Default::default()
    };
    let result = TokenTrustService::with_clock(config, Arc::new(NullClock::new(START)));
    assert!(matches!(result, Err(ServiceError::Config(_))));
}

#[tokio::test]
async fn start_and_stop_on_ephemeral_ports() {
    let config = ServiceConfig {
        rpc_port: 0,
        websocket_port: 0,
        sweep_interval_secs: 1,
        ..Default::default()
    };
    let (mut service, _clock) = service(config);
    service.start();
    tokio::task::yield_now().await;
    service.stop().await.expect("clean stop");
}

#[tokio::test]
async fn stop_keeps_the_first_shutdown_reason() {
    let config = ServiceConfig {
        enable_rpc: false,
        enable_websocket: false,
        ..Default::default()
    };
    let (mut service, _clock) = service(config);
    let mut rx = service.shutdown.subscribe();
    service.start();

    service.shutdown.trigger(ShutdownReason::Terminate);
    assert_eq!(rx.recv().await.unwrap(), ShutdownReason::Terminate);
    service.stop().await.expect("clean stop");
    assert_eq!(service.shutdown.reason(), Some(ShutdownReason::Terminate));
}
