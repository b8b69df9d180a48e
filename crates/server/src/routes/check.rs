use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use limitgate_engine::AdmissionDecision;

use crate::state::SharedState;

/// Body of an admission check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Authenticated subject id; 0 (the default) is an anonymous caller.
    #[serde(default)]
    pub subject_id: i64,
    /// Normalized request path, without the query string.
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".to_string()
}

/// POST /v1/check
///
/// Runs the admission engine for one request. Returns 200 when the request
/// may proceed, or 429 with a `Retry-After` header and the denying policy's
/// name when the caller is over its limit.
pub async fn check(State(state): State<SharedState>, Json(req): Json<CheckRequest>) -> Response {
    let decision = state
        .controller
        .admit(req.subject_id, &req.path, &req.method)
        .await;

    match decision {
        AdmissionDecision::Allowed => {
            (StatusCode::OK, Json(json!({ "allowed": true }))).into_response()
        }
        AdmissionDecision::Denied {
            policy,
            retry_after_secs,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", retry_after_secs.to_string())],
            Json(json!({
                "allowed": false,
                "message": "Rate limit exceeded",
                "policy": policy.name,
                "retry_after_secs": retry_after_secs,
            })),
        )
            .into_response(),
    }
}
