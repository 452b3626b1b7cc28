use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::controller::AppState;
use crate::repo::StoreError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    store: ComponentHealth,
}

/// Health of one dependency: its status string plus either the check
/// latency or the failure it reported.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn from_check(result: Result<u64, StoreError>) -> Self {
        match result {
            Ok(latency_ms) => Self {
                status: "healthy".to_string(),
                latency_ms: Some(latency_ms),
                error: None,
            },
            Err(e) => Self {
                status: "unhealthy".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health - overall service status with per-dependency detail.
///
/// Answers 200 while the module store is reachable, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();

    let store = ComponentHealth::from_check(check_store(&state).await);
    let healthy = store.is_healthy();

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now(),
        checks: HealthChecks { store },
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(
        duration_ms = started.elapsed().as_millis() as u64,
        healthy,
        "health check completed"
    );
    (code, Json(response))
}

/// Round-trips a minimal list query and reports its latency.
async fn check_store(state: &AppState) -> Result<u64, StoreError> {
    let started = Instant::now();
    state.store.list(0, 1).await?;
    Ok(started.elapsed().as_millis() as u64)
}
