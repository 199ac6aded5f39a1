use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{
    Path,
    State,
};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{
    json,
    Value,
};

use robowatch_commons::models::cluster::JobInfo;
use robowatch_commons::models::views::StatusBucket;
use robowatch_commons::utils::robots::list_robots_with_pool;
use robowatch_engine::views::build_dashboard;
use robowatch_kube::CreateJobParams;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub image_tag: String,
    pub memory_limit_mb: u64,
    pub max_instances: u32,
    #[serde(default)]
    pub external_files: bool,
    #[serde(default)]
    pub lifetime_seconds: Option<u64>,
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<JobInfo>> {
    Json(state.cache.jobs.data_or_default().await)
}

/// Dashboard aggregation of the jobs and pods snapshots by robot slug.
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HashMap<String, StatusBucket>>, ApiError> {
    let jobs = state.cache.jobs.data_or_default().await;
    let pods = state.cache.pods.data_or_default().await;
    let executions = state.cache.executions.data_or_default().await;
    let robots = list_robots_with_pool(&state.catalog, None).await?;

    Ok(Json(build_dashboard(&jobs, &pods, &robots, &executions)))
}

/// Manual admission pass, bounded by the same slot computation the
/// reconciler uses.
pub async fn create(
    State(state): State<Arc<AppState>>, Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if request.max_instances < 1 {
        return Err(ApiError::Validation(
            "max_instances must be at least 1".to_string(),
        ));
    }

    let params = CreateJobParams {
        robot_name: request.name,
        image_tag: request.image_tag,
        memory_limit_mb: request.memory_limit_mb,
        max_instances: request.max_instances,
        external_files: request.external_files,
        lifetime_seconds: request.lifetime_seconds.unwrap_or(600),
    };

    let created = state.kube.create_job(&params).await?;
    state.cache.jobs.invalidate().await;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Job admission completed",
            "jobs_criados": created
        })),
    ))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kube.delete_job(&name).await?;
    state.cache.jobs.invalidate().await;
    Ok(Json(json!({ "message": "Job deleted successfully" })))
}

/// Jobs carrying no identification label, for operators chasing down
/// resources the dashboard can only file under Unknown.
pub async fn unknown(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let jobs = state.cache.jobs.data_or_default().await;

    let unknown_jobs: Vec<Value> = jobs
        .iter()
        .filter(|job| {
            !job.labels.contains_key("nome_robo")
                && !job.labels.contains_key("nome-robo")
                && !job.labels.contains_key("app")
        })
        .map(|job| {
            json!({
                "name": job.name,
                "namespace": job.namespace,
                "labels": job.labels,
                "active": job.active,
                "failed": job.failed,
                "succeeded": job.completions,
                "start_time": job.start_time,
            })
        })
        .collect();

    Json(json!({
        "count": unknown_jobs.len(),
        "jobs": unknown_jobs
    }))
}
