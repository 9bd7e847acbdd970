//! RPC request handlers.
//!
//! Handlers validate transport-level input (amounts, required fields, enum
//! spellings) and delegate everything else to the lifecycle core. Core calls
//! are short and synchronous, so they run inline on the request task.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tokentrust_lifecycle::{
    AnalyzeOutcome, AnalyzeRequest, IssueOutcome, IssueRequest, LifecycleStats,
    OracleAnalyzeRequest, TokenStatus, TransitionOutcome, TriageOutcome, TriageRequest,
    VerificationOutcome, VerificationSubmission, MERCHANT_ACTOR,
};
use tokentrust_risk::{interpret_response, parse_recommendation, TransactionContext};
use tokentrust_store::{AuditEntry, EventRecord, TokenRecord};
use tokentrust_types::{AgentDecision, Decision, EventId, MerchantId, Timestamp, TokenId};

use crate::error::RpcError;
use crate::server::AppState;

type ApiResult<T> = Result<Json<T>, RpcError>;

fn require(field: &str, value: &str) -> Result<(), RpcError> {
    if value.trim().is_empty() {
        return Err(RpcError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_positive_amount(amount: u64) -> Result<(), RpcError> {
    if amount == 0 {
        return Err(RpcError::InvalidRequest("amount must be positive".into()));
    }
    Ok(())
}

// ── Tokens ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct IssueTokenBody {
    pub merchant_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub payment_reference: String,
    pub amount: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

pub async fn issue_token(
    State(state): State<AppState>,
    body: Result<Json<IssueTokenBody>, JsonRejection>,
) -> ApiResult<IssueOutcome> {
    let Json(body) = body?;
    require("merchant_id", &body.merchant_id)?;
    require("customer_id", &body.customer_id)?;
    require_positive_amount(body.amount)?;

    let outcome = state.lifecycle.issue_token(IssueRequest {
        merchant_id: MerchantId::new(body.merchant_id),
        customer_id: body.customer_id,
        payment_reference: body.payment_reference,
        amount: body.amount,
        currency: body.currency,
        idempotency_key: body.idempotency_key,
    })?;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct TokensQuery {
    pub merchant_id: String,
    /// Only tokens issued at or after this Unix timestamp.
    #[serde(default)]
    pub since: Option<u64>,
}

#[derive(Serialize)]
pub struct TokensResponse {
    pub merchant_id: String,
    pub count: usize,
    pub tokens: Vec<TokenRecord>,
}

pub async fn list_tokens(
    State(state): State<AppState>,
    query: Result<Query<TokensQuery>, QueryRejection>,
) -> ApiResult<TokensResponse> {
    let Query(query) = query?;
    require("merchant_id", &query.merchant_id)?;

    let merchant = MerchantId::new(query.merchant_id);
    let tokens = state
        .lifecycle
        .tokens_for_merchant(&merchant, query.since.map(Timestamp::new))?;
    Ok(Json(TokensResponse {
        merchant_id: merchant.to_string(),
        count: tokens.len(),
        tokens,
    }))
}

pub async fn token_status(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> ApiResult<TokenStatus> {
    Ok(Json(state.lifecycle.token(&TokenId::new(token_id))?))
}

pub async fn token_events(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> ApiResult<Vec<EventRecord>> {
    Ok(Json(
        state.lifecycle.events_for_token(&TokenId::new(token_id))?,
    ))
}

// ── Primitives ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PrimitiveBody {
    pub reason: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Serialize)]
pub struct PrimitiveResponse {
    #[serde(flatten)]
    pub outcome: TransitionOutcome,
    pub changed: bool,
}

impl From<TransitionOutcome> for PrimitiveResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            changed: outcome.changed(),
            outcome,
        }
    }
}

fn primitive_args(body: Result<Json<PrimitiveBody>, JsonRejection>) -> Result<(String, String), RpcError> {
    let Json(body) = body?;
    require("reason", &body.reason)?;
    let actor = body.actor.unwrap_or_else(|| MERCHANT_ACTOR.to_string());
    Ok((actor, body.reason))
}

pub async fn freeze_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    body: Result<Json<PrimitiveBody>, JsonRejection>,
) -> ApiResult<PrimitiveResponse> {
    let (actor, reason) = primitive_args(body)?;
    let outcome = state
        .lifecycle
        .freeze(&TokenId::new(token_id), &actor, &reason)?;
    Ok(Json(outcome.into()))
}

pub async fn unfreeze_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    body: Result<Json<PrimitiveBody>, JsonRejection>,
) -> ApiResult<PrimitiveResponse> {
    let (actor, reason) = primitive_args(body)?;
    let outcome = state
        .lifecycle
        .unfreeze(&TokenId::new(token_id), &actor, &reason)?;
    Ok(Json(outcome.into()))
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    body: Result<Json<PrimitiveBody>, JsonRejection>,
) -> ApiResult<PrimitiveResponse> {
    let (actor, reason) = primitive_args(body)?;
    let outcome = state
        .lifecycle
        .revoke(&TokenId::new(token_id), &actor, &reason)?;
    Ok(Json(outcome.into()))
}

// ── Analysis ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub outcome: AnalyzeOutcome,
    pub message: String,
}

impl From<AnalyzeOutcome> for AnalyzeResponse {
    fn from(outcome: AnalyzeOutcome) -> Self {
        let message = match outcome.decision {
            Decision::Approve => "Transaction approved".to_string(),
            Decision::Challenge => "Token frozen pending merchant verification".to_string(),
            Decision::ChallengeHigh => {
                "Token frozen pending merchant verification; high risk, auto-revoke candidate"
                    .to_string()
            }
        };
        Self { outcome, message }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<AnalyzeResponse> {
    let Json(req) = body?;
    require("token_id", req.token_id.as_str())?;
    require_positive_amount(req.amount)?;
    Ok(Json(state.lifecycle.analyze(req)?.into()))
}

#[derive(Deserialize)]
pub struct OracleAnalyzeBody {
    pub token_id: TokenId,
    pub merchant_id: MerchantId,
    pub amount: u64,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Behavioural signals for the oracle. Missing fields read as benign.
    #[serde(default)]
    pub context: TransactionContext,
}

pub async fn analyze_with_oracle(
    State(state): State<AppState>,
    body: Result<Json<OracleAnalyzeBody>, JsonRejection>,
) -> ApiResult<AnalyzeResponse> {
    let Json(body) = body?;
    require("token_id", body.token_id.as_str())?;
    require_positive_amount(body.amount)?;

    let outcome = state.lifecycle.analyze_with_oracle(
        OracleAnalyzeRequest {
            token_id: body.token_id,
            merchant_id: body.merchant_id,
            amount: body.amount,
            metadata: body.metadata,
        },
        &body.context,
    )?;
    Ok(Json(outcome.into()))
}

// ── Verification ─────────────────────────────────────────────────────────

/// A merchant's verification answer. Either `verified` or the customer's
/// free-text `user_response` must be present; an explicit flag wins.
#[derive(Deserialize)]
pub struct VerifyBody {
    pub event_id: EventId,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub user_response: Option<String>,
    #[serde(alias = "verification_method")]
    pub method: String,
    #[serde(default)]
    pub responder: Option<String>,
    #[serde(default)]
    pub evidence: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    #[serde(flatten)]
    pub outcome: VerificationOutcome,
    pub verified: bool,
}

pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let Json(body) = body?;
    require("method", &body.method)?;
    let verified = match (body.verified, body.user_response.as_deref()) {
        (Some(flag), _) => flag,
        (None, Some(text)) => interpret_response(text),
        (None, None) => {
            return Err(RpcError::InvalidRequest(
                "one of verified or user_response is required".into(),
            ))
        }
    };

    let outcome = state.lifecycle.submit_verification(VerificationSubmission {
        event_id: body.event_id,
        verified,
        method: body.method,
        responder: body.responder,
        evidence: body.evidence,
    })?;
    Ok(Json(VerifyResponse { outcome, verified }))
}

// ── Triage ───────────────────────────────────────────────────────────────

/// A triage override. `decision` is parsed strictly; `recommendation` is raw
/// model output ("summary\ndecision") parsed leniently.
#[derive(Deserialize)]
pub struct TriageBody {
    pub event_id: EventId,
    #[serde(default, alias = "agent_decision")]
    pub decision: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

pub async fn triage(
    State(state): State<AppState>,
    body: Result<Json<TriageBody>, JsonRejection>,
) -> ApiResult<TriageOutcome> {
    let Json(body) = body?;
    let (decision, reasoning) = match (body.decision.as_deref(), body.recommendation.as_deref()) {
        (Some(raw), _) => {
            let decision = raw
                .parse::<AgentDecision>()
                .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
            (decision, body.reasoning.unwrap_or_default())
        }
        (None, Some(output)) => {
            let rec = parse_recommendation(output);
            let reasoning = body.reasoning.or(rec.summary).unwrap_or_default();
            (rec.decision, reasoning)
        }
        (None, None) => {
            return Err(RpcError::InvalidRequest(
                "one of decision or recommendation is required".into(),
            ))
        }
    };

    let outcome = state.lifecycle.triage(TriageRequest {
        event_id: body.event_id,
        decision,
        reasoning,
        actor: body.actor,
    })?;
    Ok(Json(outcome))
}

// ── Events and audit ─────────────────────────────────────────────────────

pub async fn event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<EventRecord> {
    Ok(Json(state.lifecycle.event(&EventId::new(event_id))?))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub target: String,
    pub total_entries: usize,
    pub entries: Vec<AuditEntry>,
}

pub async fn audit(
    State(state): State<AppState>,
    Path(target): Path<String>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<AuditResponse> {
    let Query(query) = query?;
    if query.limit == Some(0) {
        return Err(RpcError::InvalidRequest("limit must be positive".into()));
    }
    let entries = state.lifecycle.audit_for(&target, query.limit)?;
    Ok(Json(AuditResponse {
        target,
        total_entries: entries.len(),
        entries,
    }))
}

// ── Health and metrics ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: Timestamp,
    pub uptime_secs: u64,
    pub audit_chain_intact: bool,
    pub storage_stats: LifecycleStats,
}

pub async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let now = state.lifecycle.now();
    let storage_stats = state.lifecycle.stats()?;
    let audit_chain_intact = state.lifecycle.verify_audit_chain().is_ok();
    Ok(Json(HealthResponse {
        status: if audit_chain_intact { "healthy" } else { "degraded" },
        timestamp: now,
        uptime_secs: state.started_at.elapsed_since(now),
        audit_chain_intact,
        storage_stats,
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, RpcError> {
    let registry = state.registry.as_ref().ok_or(RpcError::MetricsDisabled)?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| RpcError::Metrics(e.to_string()))?;
    let body = String::from_utf8(buffer).map_err(|e| RpcError::Metrics(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], body))
}
