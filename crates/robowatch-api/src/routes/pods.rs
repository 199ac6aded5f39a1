use std::sync::Arc;

use axum::extract::{
    Path,
    Query,
    State,
};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::cluster::PodInfo;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_tail")]
    pub tail: u32,
}

fn default_tail() -> u32 {
    100
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<PodInfo>> {
    Json(state.cache.pods.data_or_default().await)
}

pub async fn destroy(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kube.delete_pod(&name).await?;
    state.cache.pods.invalidate().await;
    Ok(Json(json!({ "message": "Pod deleted successfully" })))
}

pub async fn logs(
    State(state): State<Arc<AppState>>, Path(name): Path<String>, Query(query): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let logs = state.kube.pod_logs(&name, query.tail).await?;
    Ok(Json(json!({ "logs": logs })))
}
