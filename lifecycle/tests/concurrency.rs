//! Per-token serialisation under real threads.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::harness;
use tokentrust_lifecycle::{LifecycleError, VerificationSubmission};
use tokentrust_store::AuditAction;
use tokentrust_types::{EventStatus, TokenState};

const THREADS: usize = 16;

#[test]
fn concurrent_challenges_open_exactly_one_window() {
    let h = harness();
    let token = h.issue();
    let barrier = Arc::new(Barrier::new(THREADS));

    let results: Vec<_> = (0..THREADS)
        .map(|i| {
            let lifecycle = Arc::clone(&h.lifecycle);
            let barrier = Arc::clone(&barrier);
            let token_id = token.id.clone();
            thread::spawn(move || {
                barrier.wait();
                lifecycle.analyze(tokentrust_lifecycle::AnalyzeRequest {
                    token_id,
                    merchant_id: common::MERCHANT.into(),
                    amount: 1_000,
                    risk_score: 50 + (i as i64 % 50),
                    metadata: serde_json::Value::Null,
                    explanation: None,
                })
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let pending = results
        .iter()
        .filter(|r| matches!(r, Err(LifecycleError::VerificationPending { .. })))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(pending, THREADS - 1);

    let events = h.lifecycle.events_for_token(&token.id).unwrap();
    let waiting = events
        .iter()
        .filter(|e| e.status == EventStatus::WaitingVerification)
        .count();
    assert_eq!(waiting, 1);
    assert_eq!(
        h.actions(token.id.as_str()),
        vec![AuditAction::Issue, AuditAction::Freeze]
    );
}

#[test]
fn first_verification_response_wins() {
    let h = harness();
    let token = h.issue();
    let out = h.analyze(&token.id, 65);
    let barrier = Arc::new(Barrier::new(THREADS));

    let results: Vec<_> = (0..THREADS)
        .map(|i| {
            let lifecycle = Arc::clone(&h.lifecycle);
            let barrier = Arc::clone(&barrier);
            let event_id = out.event_id.clone();
            thread::spawn(move || {
                barrier.wait();
                lifecycle.submit_verification(VerificationSubmission {
                    event_id,
                    verified: i % 2 == 0,
                    method: "otp".into(),
                    responder: Some(format!("responder-{i}")),
                    evidence: None,
                })
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().all(|r| matches!(
        r,
        Ok(_) | Err(LifecycleError::EventNotOpen { .. })
    )));

    let event = h.lifecycle.event(&out.event_id).unwrap();
    assert_eq!(event.status, winners[0].event_status);
    let expected = if event.status == EventStatus::VerifiedSuccess {
        TokenState::Active
    } else {
        TokenState::Revoked
    };
    assert_eq!(h.lifecycle.token(&token.id).unwrap().token.state, expected);
    h.lifecycle.verify_audit_chain().unwrap();
}

#[test]
fn independent_tokens_progress_in_parallel() {
    let h = harness();
    let tokens: Vec<_> = (0..THREADS).map(|_| h.issue()).collect();

    let handles: Vec<_> = tokens
        .iter()
        .map(|t| {
            let lifecycle = Arc::clone(&h.lifecycle);
            let id = t.id.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    lifecycle.freeze(&id, "ops", "hold").unwrap();
                    lifecycle.unfreeze(&id, "ops", "release").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in &tokens {
        assert_eq!(h.lifecycle.token(&t.id).unwrap().token.state, TokenState::Active);
        assert_eq!(h.actions(t.id.as_str()).len(), 41);
    }
    h.lifecycle.verify_audit_chain().unwrap();
}
