//! HTTP error body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gate_access::IssuanceError;
use gate_core::GateError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// JSON error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable status
    pub status: String,
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", 400, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", 403, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", 404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", 409, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", 500, message)
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Invalid { .. } | GateError::Crypto { .. } | GateError::Serialization { .. } => {
                Self::bad_request(err.to_string())
            }
            GateError::NotFound { .. } => Self::not_found(err.to_string()),
            GateError::PermissionDenied { .. } => Self::forbidden(err.to_string()),
            GateError::Conflict { .. } => Self::conflict(err.to_string()),
            GateError::Storage { .. } | GateError::Internal { .. } => {
                error!(error = %err, "request failed");
                Self::internal("internal error")
            }
        }
    }
}

impl From<IssuanceError> for ApiError {
    fn from(err: IssuanceError) -> Self {
        match err {
            IssuanceError::SubjectNotFound(_) => Self::not_found(err.to_string()),
            IssuanceError::CredentialInactive(_) => Self::conflict(err.to_string()),
            IssuanceError::Gate(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Handler result
pub type ApiResult<T> = Result<Json<T>, ApiError>;
