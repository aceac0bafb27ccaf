//! API error handling for the storage payments surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payments::PaymentError;

/// JSON error envelope returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: u64,
}

impl ApiError {
    pub fn new(code: u16, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn with_details(code: u16, message: String, details: serde_json::Value) -> Self {
        Self {
            code,
            message,
            details: Some(details),
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(400, message.to_string())
    }

    pub fn payment_required(message: &str) -> Self {
        Self::new(402, message.to_string())
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(409, message.to_string())
    }

    pub fn unprocessable_entity(message: &str) -> Self {
        Self::new(422, message.to_string())
    }

    pub fn internal_server_error(message: &str) -> Self {
        Self::new(500, message.to_string())
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new(503, message.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Map engine errors onto HTTP semantics
///
/// The distinctions the engine draws (declined vs reverted vs unreachable
/// vs short of tokens) survive into the status code so the front end can
/// present the right remediation.
impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let message = err.to_string();
        match err {
            PaymentError::Validation(_) => Self::unprocessable_entity(&message),
            PaymentError::StaleSnapshot { planned, latest } => Self::with_details(
                409,
                message,
                serde_json::json!({ "planned_version": planned, "latest_version": latest }),
            ),
            PaymentError::Rejected { .. } | PaymentError::Reverted { .. } => {
                Self::bad_request(&message)
            }
            PaymentError::InsufficientGas { .. } => Self::payment_required(&message),
            PaymentError::InsufficientFunds {
                token,
                needed,
                available,
            } => Self::with_details(
                402,
                message,
                serde_json::json!({
                    "token": token,
                    "needed": needed.to_string(),
                    "available": available.to_string(),
                }),
            ),
            PaymentError::Network { .. } | PaymentError::Refresh(_) => {
                Self::service_unavailable(&message)
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_server_error(&err.to_string())
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
