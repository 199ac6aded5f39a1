use std::sync::Arc;

use axum::extract::{
    Path,
    State,
};
use axum::Json;
use serde_json::json;

use robowatch_commons::models::failure::FailureRecord;
use robowatch_commons::utils::failures::{
    get_failure_with_pool,
    list_failures_with_pool,
};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FailureRecord>>, ApiError> {
    let records = list_failures_with_pool(&state.catalog).await?;
    Ok(Json(records))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<FailureRecord>, ApiError> {
    let record = get_failure_with_pool(&name, &state.catalog).await?;
    Ok(Json(record))
}

/// Logs captured at detection time; the pod itself is usually gone.
pub async fn logs(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = get_failure_with_pool(&name, &state.catalog).await?;
    let logs = if record.logs.is_empty() {
        "No logs available".to_string()
    } else {
        record.logs
    };
    Ok(Json(json!({ "logs": logs })))
}
