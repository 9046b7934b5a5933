//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Request validation
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

use crate::db;
use crate::models::HealthResponse;
use crate::state::AppState;

/// Fully layered HTTP service
pub type App = NormalizePath<Router>;

/// Router plus CORS and request tracing, with trailing slashes trimmed
/// before routing so `/api/spots/` and `/api/spots` hit the same handler
pub fn create_app(state: AppState) -> App {
    let router = create_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    NormalizePath::trim_trailing_slash(router)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_connected = db::ping(&state.pool).await;
    let camera_open = state.camera.is_open().await;

    let response = HealthResponse {
        status: if db_connected { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db_connected,
        camera_open,
        camera_open_count: state.camera.open_count(),
    };

    Json(response)
}
