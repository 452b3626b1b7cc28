use axum::{extract::State, Json};

use crate::{
    api::error::ApiError,
    controller::AppState,
    domain::{SimulationOutcome, SimulationRequest},
};

/// POST /api/v1/simulate - Run an I-V curve simulation for a stored module
pub async fn simulate_iv_curve(
    State(state): State<AppState>,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<SimulationOutcome>, ApiError> {
    let outcome = state.simulator.simulate(&request).await?;
    Ok(Json(outcome))
}
