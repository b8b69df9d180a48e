pub mod check;
pub mod config;
pub mod health;
pub mod logs;
pub mod metrics;
pub mod stats;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

/// Build the axum router with the admission check and observability routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Admission check
        .route("/v1/check", post(check::check))
        // Health check
        .route("/api/health", get(health::health_check))
        // Prometheus metrics
        .route("/api/metrics", get(metrics::get_metrics))
        // Running configuration (read-only)
        .route("/api/config", get(config::get_config))
        // Recent admission decisions
        .route("/api/logs", get(logs::get_logs))
        // Traffic statistics
        .route("/api/stats", get(stats::get_stats))
        // Attach shared state and middleware
        .with_state(state)
        .layer(cors)
}
