use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::api::{health, modules, simulate};
use crate::controller::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/modules",
            post(modules::create_module).get(modules::list_modules),
        )
        .route(
            "/modules/:id",
            get(modules::get_module)
                .put(modules::update_module)
                .delete(modules::delete_module),
        )
        .route("/simulate", post(simulate::simulate_iv_curve))
        .route("/health", get(health::health_check))
        .route("/healthz", get(healthz))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
