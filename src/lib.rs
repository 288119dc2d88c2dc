//! Resale Price Checker
//!
//! Accepts photos of second-hand items, identifies the item and suggests a
//! resale price range from comparable market listings. Analysis runs as a
//! background job that callers poll for its result.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use app_state::AppState;
use routes::analysis::MAX_REQUEST_BYTES;

/// API routes without transport layers or the metrics endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::analysis::service_info))
        .route("/health", get(routes::health::health_check))
        .route("/api/analyze", post(routes::analysis::submit_analysis))
        .route(
            "/api/analysis/{job_id}",
            get(routes::analysis::get_analysis).delete(routes::analysis::delete_analysis),
        )
        .route(
            "/api/analysis/{job_id}/rerun",
            post(routes::analysis::rerun_analysis),
        )
        .route("/api/history/{user_id}", get(routes::analysis::get_history))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}
