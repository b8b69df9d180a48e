use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Returns aggregated traffic statistics derived from the Prometheus
/// counters, the retained audit window, and the server's uptime.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    let total_requests = state.metrics.requests_total.get();
    let denied_requests = state.metrics.requests_denied.get();
    let degraded_requests = state.metrics.degraded_total.get();

    let requests_per_second = if uptime_secs > 0 {
        total_requests as f64 / uptime_secs as f64
    } else {
        0.0
    };

    let aggregate = state.audit_log.aggregate();

    Json(json!({
        "total_requests": total_requests,
        "denied_requests": denied_requests,
        "degraded_requests": degraded_requests,
        "avg_response_time_ms": aggregate.avg_response_time_ms,
        "active_subjects": aggregate.active_subjects,
        "uptime_secs": uptime_secs,
        "requests_per_second": requests_per_second
    }))
}
