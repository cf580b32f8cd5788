// Route modules
pub mod health;
pub mod receipt;

use crate::{app_state::AppState, middleware::logging_middleware};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_millis(state.config.server.request_timeout_ms);

    // Headers mobile and web clients attach to every call
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/health", get(health::health))
        .route("/validate-receipt", post(receipt::validate_receipt))
        .nest("/api/v1", api_v1_routes())
        .layer(middleware::from_fn(logging_middleware))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new().route("/receipts/validate", post(receipt::validate_receipt))
}
