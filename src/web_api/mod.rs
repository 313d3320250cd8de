//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - WebSocket upgrade and subscriber lifecycle
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::{HealthResponse, SystemStatusResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        redis_connected: state.store.mirror_connected(),
    };

    Json(response)
}

/// System status endpoint
pub async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    let response = SystemStatusResponse {
        total_webcams: state.registry.len(),
        cached_results: state.store.stats().entries,
        subscribers: state.hub.connection_count(),
        last_analysis: state.store.latest_timestamp(),
    };

    Json(response)
}
