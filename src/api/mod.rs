pub mod error;
pub mod health;
pub mod modules;
pub mod simulate;
pub mod v1;

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::{config::Config, controller::AppState};

/// Request body cap. Module payloads are a few hundred bytes; anything
/// near this limit is not a legitimate request.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Front-end development server origin allowed through CORS.
const FRONTEND_ORIGIN: &str = "http://localhost:3000";

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new().nest("/api/v1", v1::router(state));

    if cfg.server.enable_cors {
        router = router.layer(cors_layer());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    cfg.server.request_timeout_secs,
                ))),
        )
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(FRONTEND_ORIGIN.parse().unwrap()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
