use std::sync::Arc;

use axum::extract::{
    Path,
    State,
};
use axum::http::StatusCode;
use axum::Json;
use log::{
    info,
    warn,
};
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::robot::{
    Robot,
    RobotKind,
};
use robowatch_commons::models::views::RpaSummary;
use robowatch_commons::utils::robots::{
    delete_robot_with_pool,
    get_robot_with_pool,
    insert_robot_with_pool,
    list_robots_with_pool,
    set_robot_active_with_pool,
    update_robot_with_pool,
};
use robowatch_engine::reconciler::reconcile_robot;
use robowatch_engine::views::{
    active_jobs_by_robot,
    build_rpa_summaries,
};
use robowatch_commons::models::execution::pending_count;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRpaRequest {
    pub name: String,
    #[serde(default, rename = "apelido")]
    pub alias: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_tag: String,
    #[serde(default)]
    pub image_repository: Option<String>,
    pub memory_limit_mb: u64,
    pub max_instances: u32,
    #[serde(default)]
    pub external_files: bool,
    #[serde(default)]
    pub lifetime_seconds: Option<u64>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRpaRequest {
    #[serde(default, rename = "apelido")]
    pub alias: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub image_tag: Option<String>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub max_instances: Option<u32>,
    #[serde(default)]
    pub external_files: Option<bool>,
    #[serde(default)]
    pub lifetime_seconds: Option<u64>,
}

/// Read-through of the processed-RPAs snapshot; synthesized once when the
/// poller has not produced it yet.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RpaSummary>>, ApiError> {
    if let Some(view) = state.cache.rpas_processed.data().await {
        return Ok(Json(view));
    }

    let robots = list_robots_with_pool(&state.catalog, Some(RobotKind::Rpa)).await?;
    let executions = state.cache.executions.data_or_default().await;
    let jobs = state.cache.jobs.data_or_default().await;

    let view = build_rpa_summaries(&robots, &executions, &jobs);
    state.cache.rpas_processed.store(view.clone()).await;
    Ok(Json(view))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<RpaSummary>, ApiError> {
    let robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Rpa {
        return Err(ApiError::NotFound(format!("'{name}' is not an RPA")));
    }

    let executions = state.cache.executions.data_or_default().await;
    let jobs = state.cache.jobs.data_or_default().await;
    let jobs_by_robot = active_jobs_by_robot(&jobs);

    let summary = RpaSummary {
        execucoes_pendentes: pending_count(&robot.name, &executions),
        jobs_ativos: *jobs_by_robot.get(&robot.name.to_lowercase()).unwrap_or(&0),
        robot,
    };
    Ok(Json(summary))
}

pub async fn create(
    State(state): State<Arc<AppState>>, Json(request): Json<CreateRpaRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut robot = Robot::new(request.name, RobotKind::Rpa);
    robot.alias = request.alias;
    robot.tags = request.tags;
    robot.image_tag = request.image_tag;
    if let Some(repository) = request.image_repository {
        robot.image_repository = repository;
    }
    robot.memory_limit_mb = request.memory_limit_mb;
    robot.max_instances = Some(request.max_instances);
    robot.external_files = Some(request.external_files);
    robot.lifetime_seconds = request.lifetime_seconds;
    if let Some(namespace) = request.namespace {
        robot.namespace = namespace;
    }

    robot
        .clone()
        .prepare()
        .validate()
        .map_err(ApiError::Validation)?;

    let robot = insert_robot_with_pool(robot, &state.catalog).await?;

    // if the queue already holds work for this robot, admit immediately
    // instead of waiting for the next reconcile tick
    let executions = state.mysql.executions_for(&[robot.name.clone()]).await;
    if pending_count(&robot.name, &executions) > 0 {
        info!(
            "RPA {} created with pending executions, reconciling now",
            robot.name
        );
        if let Err(e) = reconcile_robot(&state.kube, &robot, &executions).await {
            // robot creation stands; the reconciler retries on its next tick
            warn!("Immediate reconcile for {} failed: {e}", robot.name);
        }
    }

    state.cache.rpas_processed.invalidate().await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "RPA created successfully" })),
    ))
}

pub async fn update(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
    Json(request): Json<UpdateRpaRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Rpa {
        return Err(ApiError::NotFound(format!("'{name}' is not an RPA")));
    }

    if let Some(alias) = request.alias {
        robot.alias = Some(alias);
    }
    if let Some(tags) = request.tags {
        robot.tags = tags;
    }
    if let Some(image_tag) = request.image_tag {
        robot.image_tag = image_tag;
    }
    if let Some(memory) = request.memory_limit_mb {
        robot.memory_limit_mb = memory;
    }
    if let Some(max_instances) = request.max_instances {
        robot.max_instances = Some(max_instances);
    }
    if let Some(external_files) = request.external_files {
        robot.external_files = Some(external_files);
    }
    if let Some(lifetime) = request.lifetime_seconds {
        robot.lifetime_seconds = Some(lifetime);
    }

    update_robot_with_pool(robot, &state.catalog).await?;
    state.cache.rpas_processed.invalidate().await;
    Ok(Json(json!({ "message": "RPA updated successfully" })))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Rpa {
        return Err(ApiError::NotFound(format!("'{name}' is not an RPA")));
    }

    delete_robot_with_pool(&name, &state.catalog).await?;
    state.cache.rpas_processed.invalidate().await;
    Ok(Json(json!({ "message": "RPA deleted successfully" })))
}

pub async fn standby(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    set_robot_active_with_pool(&name, false, &state.catalog).await?;
    state.cache.rpas_processed.invalidate().await;
    Ok(Json(json!({ "message": "RPA moved to standby" })))
}

pub async fn activate(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    set_robot_active_with_pool(&name, true, &state.catalog).await?;
    state.cache.rpas_processed.invalidate().await;
    Ok(Json(json!({ "message": "RPA activated" })))
}
