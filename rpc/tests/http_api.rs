//! End-to-end tests of the HTTP surface against an in-memory core.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokentrust_lifecycle::TokenLifecycle;
use tokentrust_nullables::{null_stores, NullClock};
use tokentrust_rpc::server::router;
use tokentrust_rpc::AppState;
use tokentrust_types::LifecycleParams;
use tower::ServiceExt;

const START: u64 = 1_700_000_000;
const MERCHANT: &str = "merchant_42";

struct TestApp {
    router: Router,
    clock: Arc<NullClock>,
}

fn app() -> TestApp {
    app_with_registry(Some(prometheus::Registry::new()))
}

fn app_with_registry(registry: Option<prometheus::Registry>) -> TestApp {
    let clock = Arc::new(NullClock::new(START));
    let lifecycle =
        TokenLifecycle::new(null_stores(), clock.clone(), LifecycleParams::default()).unwrap();
    let mut state = AppState::new(Arc::new(lifecycle));
    if let Some(registry) = registry {
        state = state.with_registry(registry);
    }
    TestApp {
        router: router(state),
        clock,
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    async fn issue(&self) -> String {
        let (status, body) = self
            .post(
                "/tokens",
                json!({
                    "merchant_id": MERCHANT,
                    "customer_id": "cust_7",
                    "payment_reference": "order-1001",
                    "amount": 125_000,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"]["id"].as_str().unwrap().to_string()
    }

    async fn analyze(&self, token: &str, score: i64) -> (StatusCode, Value) {
        self.post(
            "/analyze",
            json!({
                "token_id": token,
                "merchant_id": MERCHANT,
                "amount": 125_000,
                "risk_score": score,
            }),
        )
        .await
    }
}

// ── Issuance and reads ──────────────────────────────────────────────────

#[tokio::test]
async fn issued_token_is_active() {
    let app = app();
    let token = app.issue().await;

    let (status, body) = app.get(&format!("/token/{token}/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["expired"], false);
}

#[tokio::test]
async fn idempotent_issue_returns_same_token() {
    let app = app();
    let request = json!({
        "merchant_id": MERCHANT,
        "customer_id": "cust_7",
        "amount": 500,
        "idempotency_key": "checkout-9",
    });
    let (_, first) = app.post("/tokens", request.clone()).await;
    let (status, second) = app.post("/tokens", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["token"]["id"], second["token"]["id"]);
    assert_eq!(first["created"], true);
    assert_eq!(second["created"], false);
}

#[tokio::test]
async fn merchant_listing_only_shows_own_tokens() {
    let app = app();
    app.issue().await;
    app.issue().await;

    let (status, body) = app.get(&format!("/tokens?merchant_id={MERCHANT}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, other) = app.get("/tokens?merchant_id=someone_else").await;
    assert_eq!(other["count"], 0);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = app();
    let (status, body) = app.get("/token/tok_missing/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "token_not_found");

    let (status, body) = app.get("/event/evt_missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "event_not_found");

    let (status, _) = app.analyze("tok_missing", 20).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Input validation ────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_input_is_unprocessable() {
    let app = app();
    let token = app.issue().await;

    let (status, body) = app.analyze(&token, 150).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_score");

    let (status, body) = app
        .post(
            "/analyze",
            json!({ "token_id": token, "merchant_id": MERCHANT, "amount": 0, "risk_score": 20 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = app.post("/analyze", json!({ "token_id": token })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = app
        .post("/tokens", json!({ "merchant_id": "", "customer_id": "c", "amount": 1 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn rejected_input_leaves_no_audit_trail() {
    let app = app();
    let token = app.issue().await;
    app.analyze(&token, -1).await;

    let (_, body) = app.get(&format!("/audit/{token}")).await;
    assert_eq!(body["total_entries"], 1);
    assert_eq!(body["entries"][0]["action"], "issue");
}

// ── Analysis and verification ───────────────────────────────────────────

#[tokio::test]
async fn low_score_is_approved() {
    let app = app();
    let token = app.issue().await;

    let (status, body) = app.analyze(&token, 20).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "approve");
    assert_eq!(body["event_status"], "approved");
    assert_eq!(body["token_state"], "active");
    assert_eq!(body["tier"], "LOW");
    assert!(body["deadline"].is_null());
}

#[tokio::test]
async fn medium_score_challenge_then_verified_by_text() {
    let app = app();
    let token = app.issue().await;

    let (status, body) = app.analyze(&token, 65).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "challenge");
    assert_eq!(body["event_status"], "waiting_verification");
    assert_eq!(body["token_state"], "frozen");
    assert_eq!(body["deadline"], START + 600);
    let event = body["event_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/verify",
            json!({
                "event_id": event,
                "user_response": "Yes, that was me",
                "verification_method": "otp",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["verified"], true);
    assert_eq!(body["event_status"], "verified_success");
    assert_eq!(body["token_state"], "active");

    let (status, body) = app
        .post("/verify", json!({ "event_id": event, "verified": true, "method": "otp" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "event_not_open");
}

#[tokio::test]
async fn high_score_failure_revokes_and_blocks_analysis() {
    let app = app();
    let token = app.issue().await;

    let (_, body) = app.analyze(&token, 90).await;
    assert_eq!(body["decision"], "challenge_high");
    assert_eq!(body["auto_revoke_candidate"], true);
    let event = body["event_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/verify", json!({ "event_id": event, "verified": false, "method": "call" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event_status"], "verified_failure");
    assert_eq!(body["token_state"], "revoked");

    let (status, body) = app.analyze(&token, 10).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "token_revoked");
}

#[tokio::test]
async fn analysis_under_another_merchant_is_forbidden() {
    let app = app();
    let token = app.issue().await;

    let (status, body) = app
        .post(
            "/analyze",
            json!({
                "token_id": token,
                "merchant_id": "someone_else",
                "amount": 125_000,
                "risk_score": 65,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "merchant_mismatch");

    let (_, body) = app.get(&format!("/token/{token}/status")).await;
    assert_eq!(body["state"], "active");
}

#[tokio::test]
async fn second_challenge_conflicts_while_window_open() {
    let app = app();
    let token = app.issue().await;
    app.analyze(&token, 65).await;

    let (status, body) = app.analyze(&token, 70).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "verification_pending");
}

#[tokio::test]
async fn verify_requires_an_answer() {
    let app = app();
    let token = app.issue().await;
    let (_, body) = app.analyze(&token, 65).await;

    let (status, body) = app
        .post("/verify", json!({ "event_id": body["event_id"], "method": "otp" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn lapsed_window_revokes_on_next_read() {
    let app = app();
    let token = app.issue().await;
    let (_, body) = app.analyze(&token, 65).await;
    let event = body["event_id"].as_str().unwrap().to_string();

    app.clock.advance(601);

    let (status, body) = app.get(&format!("/event/{event}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "verified_failure");

    let (_, body) = app.get(&format!("/token/{token}/status")).await;
    assert_eq!(body["state"], "revoked");

    let (status, body) = app
        .post("/verify", json!({ "event_id": event, "verified": true, "method": "otp" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "event_not_open");
}

#[tokio::test]
async fn oracle_analysis_scores_context() {
    let app = app();
    let token = app.issue().await;

    let (status, body) = app
        .post(
            "/analyze/oracle",
            json!({
                "token_id": token,
                "merchant_id": MERCHANT,
                "amount": 1_000,
                "context": { "vpn_detected": true, "device_trust_score": 10, "new_device": true },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    // 10 + 30 (VPN) + 30 (low device trust) + 15 (new device)
    assert_eq!(body["risk_score"], 85);
    assert_eq!(body["decision"], "challenge_high");
    assert!(body["explanation"].as_str().unwrap().contains("VPN"));
}

// ── Triage ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn triage_approve_closes_window() {
    let app = app();
    let token = app.issue().await;
    let (_, body) = app.analyze(&token, 65).await;
    let event = body["event_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/triage",
            json!({ "event_id": event, "agent_decision": "APPROVE", "reasoning": "known customer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["event_status"], "agent_overridden");
    assert_eq!(body["token_state"], "active");

    let (status, _) = app
        .post("/verify", json!({ "event_id": event, "verified": true, "method": "otp" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn triage_rejects_unknown_decision() {
    let app = app();
    let token = app.issue().await;
    let (_, body) = app.analyze(&token, 65).await;

    let (status, body) = app
        .post("/triage", json!({ "event_id": body["event_id"], "decision": "escalate" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn triage_accepts_raw_recommendation() {
    let app = app();
    let token = app.issue().await;
    let (_, body) = app.analyze(&token, 65).await;
    let event = body["event_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/triage",
            json!({ "event_id": event, "recommendation": "Clear account takeover pattern\nrevoke" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["decision"], "revoke");
    assert_eq!(body["token_state"], "revoked");

    let (_, audit) = app.get(&format!("/audit/{event}")).await;
    let last = &audit["entries"][audit["total_entries"].as_u64().unwrap() as usize - 1];
    assert_eq!(last["reason"], "Clear account takeover pattern");
}

// ── Primitives ──────────────────────────────────────────────────────────

#[tokio::test]
async fn freeze_is_idempotent_over_http() {
    let app = app();
    let token = app.issue().await;
    let body = json!({ "reason": "manual review" });

    let (status, first) = app.post(&format!("/token/{token}/freeze"), body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["changed"], true);
    assert_eq!(first["state"], "frozen");

    let (status, second) = app.post(&format!("/token/{token}/freeze"), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["changed"], false);
    assert_eq!(second["action"], "freeze(no-op)");

    let (_, audit) = app.get(&format!("/audit/{token}")).await;
    assert_eq!(audit["total_entries"], 3);
}

#[tokio::test]
async fn revoked_token_refuses_unfreeze() {
    let app = app();
    let token = app.issue().await;
    app.post(&format!("/token/{token}/revoke"), json!({ "reason": "fraud" }))
        .await;

    let (status, body) = app
        .post(&format!("/token/{token}/unfreeze"), json!({ "reason": "oops" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "token_revoked");
}

// ── Audit, health, metrics ──────────────────────────────────────────────

#[tokio::test]
async fn audit_limit_keeps_most_recent() {
    let app = app();
    let token = app.issue().await;
    for _ in 0..3 {
        app.post(&format!("/token/{token}/freeze"), json!({ "reason": "r" }))
            .await;
    }

    let (status, body) = app.get(&format!("/audit/{token}?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 2);
    assert_eq!(body["entries"][1]["action"], "freeze(no-op)");

    let (status, _) = app.get(&format!("/audit/{token}?limit=0")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_reports_storage_stats() {
    let app = app();
    let token = app.issue().await;
    app.analyze(&token, 65).await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["audit_chain_intact"], true);
    assert_eq!(body["storage_stats"]["tokens"], 1);
    assert_eq!(body["storage_stats"]["events"], 1);
    assert_eq!(body["storage_stats"]["open_events"], 1);
}

#[tokio::test]
async fn metrics_endpoint_serves_text_format() {
    let registry = prometheus::Registry::new();
    let counter = prometheus::IntCounter::new("tokentrust_test_total", "test counter").unwrap();
    registry.register(Box::new(counter.clone())).unwrap();
    counter.inc();

    let app = app_with_registry(Some(registry));
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tokentrust_test_total 1"));
}

#[tokio::test]
async fn metrics_disabled_is_not_found() {
    let app = app_with_registry(None);
    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "metrics_disabled");
}
