//! RPC error types and their HTTP mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tokentrust_lifecycle::LifecycleError;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("metrics encoding failed: {0}")]
    Metrics(String),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Lifecycle(e) => match e {
                LifecycleError::TokenNotFound(_) | LifecycleError::EventNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                LifecycleError::TokenRevoked(_) | LifecycleError::MerchantMismatch { .. } => {
                    StatusCode::FORBIDDEN
                }
                LifecycleError::EventNotOpen { .. }
                | LifecycleError::EventAlreadyTerminal { .. }
                | LifecycleError::VerificationExpired { .. }
                | LifecycleError::VerificationPending { .. } => StatusCode::CONFLICT,
                LifecycleError::InvalidScore(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MetricsDisabled => StatusCode::NOT_FOUND,
            Self::Metrics(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error name used in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lifecycle(e) => e.kind(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::MetricsDisabled => "metrics_disabled",
            Self::Metrics(_) => "metrics_error",
            Self::Server(_) => "server_error",
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "request failed: {}", self);
        } else {
            warn!(kind = self.kind(), status = status.as_u16(), "request rejected: {}", self);
        }
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for RpcError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}
