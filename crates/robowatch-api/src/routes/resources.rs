use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{
    json,
    Value,
};

use crate::error::ApiError;
use crate::state::AppState;

/// VM telemetry with its cache freshness, so the UI can flag stale data.
pub async fn vm(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.cache.vm_resources.read().await {
        Some(entry) => Json(json!({
            "data": entry.data,
            "updated_at": entry.updated_at,
            "error": entry.error,
        })),
        None => Json(json!({
            "data": robowatch_commons::models::vm::VmResources::default(),
            "updated_at": Utc::now(),
            "error": "not yet collected",
        })),
    }
}

/// Live per-pod usage from the metrics API, joined with the running-pods
/// snapshot for phase and start time.
pub async fn pods(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Value>>, ApiError> {
    let usages = state.kube.top_pods().await?;
    let snapshot = state.cache.pods.data_or_default().await;

    let rows = usages
        .into_iter()
        .map(|usage| {
            let pod = snapshot.iter().find(|p| p.name == usage.pod_name);
            json!({
                "pod_name": usage.pod_name,
                "nome_robo": pod
                    .map(|p| robowatch_commons::naming::robot_slug(&p.labels, &p.name))
                    .unwrap_or_default(),
                "cpu_used_millicores": usage.cpu_used_millicores,
                "memory_used_mb": usage.memory_used_mb,
                "phase": pod.map(|p| p.phase.clone()).unwrap_or_default(),
                "start_time": pod.map(|p| p.start_time.clone()).unwrap_or_default(),
            })
        })
        .collect();

    Ok(Json(rows))
}
