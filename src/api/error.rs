//! HTTP error surface.
//!
//! Every handler failure funnels into [`ApiError`], which fixes the status
//! code, the machine-readable `error` tag and the client-visible message.
//! Backend faults are logged in full and answered with a generic body;
//! simulation pipeline failures go back verbatim because they describe the
//! caller's own module data.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::SimulationError;
use crate::repo::StoreError;

/// The category lives in the response's `error` tag, so the display
/// strings carry only the message itself.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("database error: {0}")]
    DatabaseError(String),
}

/// JSON body every error response carries.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::SimulationFailed(_) | ApiError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::Conflict(_) => "Conflict",
            ApiError::SimulationFailed(_) => "SimulationFailed",
            ApiError::DatabaseError(_) => "DatabaseError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::DatabaseError(_) => {
                tracing::error!(error = %self, "storage failure");
                "An internal error occurred".to_string()
            }
            ApiError::SimulationFailed(_) => {
                tracing::error!(error = %self, "simulation pipeline failed");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self, "client error");
                self.to_string()
            }
        };

        let body = ErrorResponse {
            error: self.error_type().to_string(),
            message,
            details: None,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateName(name) => {
                ApiError::Conflict(format!("A module named '{}' already exists", name))
            }
            StoreError::Backend(detail) => ApiError::DatabaseError(detail),
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(error: SimulationError) -> Self {
        match error {
            SimulationError::ModuleNotFound(id) => {
                ApiError::NotFound(format!("Module with ID {} not found", id))
            }
            SimulationError::Sdm(e) => ApiError::SimulationFailed(e.to_string()),
            SimulationError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdm::SdmError;
    use uuid::Uuid;

    #[test]
    fn test_status_and_tag_per_variant() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND, "NotFound"),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BadRequest"),
            (ApiError::ValidationError("x".into()), StatusCode::BAD_REQUEST, "ValidationError"),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT, "Conflict"),
            (
                ApiError::SimulationFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "SimulationFailed",
            ),
            (
                ApiError::DatabaseError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "DatabaseError",
            ),
        ];
        for (error, status, tag) in cases {
            assert_eq!(error.status_code(), status, "{tag}");
            assert_eq!(error.error_type(), tag);
        }
    }

    #[test]
    fn test_client_message_passthrough() {
        let error = ApiError::NotFound("Module with ID 123 not found".to_string());
        assert_eq!(error.to_string(), "Module with ID 123 not found");
    }

    #[test]
    fn test_store_error_mapping() {
        let err: ApiError = StoreError::DuplicateName("Panel A".to_string()).into();
        assert!(matches!(err, ApiError::Conflict(msg) if msg.contains("Panel A")));

        let err: ApiError = StoreError::Backend("connection reset".to_string()).into();
        assert!(matches!(err, ApiError::DatabaseError(_)));
    }

    #[test]
    fn test_simulation_error_mapping() {
        let id = Uuid::new_v4();
        let err: ApiError = SimulationError::ModuleNotFound(id).into();
        assert!(matches!(err, ApiError::NotFound(msg) if msg.contains(&id.to_string())));

        let err: ApiError = SimulationError::Sdm(SdmError::FitNonConvergence {
            iterations: 1400,
            residual: 3.2e-4,
        })
        .into();
        match err {
            ApiError::SimulationFailed(msg) => assert!(msg.contains("did not converge")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
