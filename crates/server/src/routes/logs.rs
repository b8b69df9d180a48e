use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::SharedState;

/// Query parameters for the decision log endpoint.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Maximum number of entries to return (default: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of entries to skip (default: 0).
    #[serde(default)]
    pub offset: usize,
    /// Optional filter by subject id.
    pub subject_id: Option<i64>,
    /// Optional filter: only denied (or only allowed) decisions.
    pub allowed: Option<bool>,
}

fn default_limit() -> usize {
    100
}

/// GET /api/logs
///
/// Returns a paginated, optionally filtered list of recent admission
/// decisions from the in-memory log, newest first.
pub async fn get_logs(
    State(state): State<SharedState>,
    Query(params): Query<LogQuery>,
) -> Json<Value> {
    let entries = state.audit_log.snapshot();

    // Apply filters, newest first.
    let filtered: Vec<_> = entries
        .iter()
        .rev()
        .filter(|entry| {
            if let Some(subject_id) = params.subject_id {
                if entry.subject_id != subject_id {
                    return false;
                }
            }
            if let Some(allowed) = params.allowed {
                if entry.allowed != allowed {
                    return false;
                }
            }
            true
        })
        .collect();

    let total = filtered.len();

    // Apply pagination.
    let page: Vec<_> = filtered
        .into_iter()
        .skip(params.offset)
        .take(params.limit)
        .cloned()
        .collect();

    Json(json!({
        "total": total,
        "offset": params.offset,
        "limit": params.limit,
        "entries": page
    }))
}
