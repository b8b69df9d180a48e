use axum::extract::State;
use axum::Json;

use limitgate_common::AppConfig;

use crate::state::SharedState;

/// GET /api/config
///
/// Returns the running configuration. Read-only: config changes go through
/// the YAML file and the reload timer, not this API.
pub async fn get_config(State(state): State<SharedState>) -> Json<AppConfig> {
    Json(state.config.clone())
}
