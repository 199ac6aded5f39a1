use std::sync::Arc;

use axum::extract::{
    Path,
    State,
};
use axum::http::StatusCode;
use axum::Json;
use log::error;
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::robot::{
    Robot,
    RobotKind,
};
use robowatch_commons::models::views::DeploymentSummary;
use robowatch_commons::utils::error::StoreError;
use robowatch_commons::utils::robots::{
    delete_robot_with_pool,
    get_robot_with_pool,
    insert_robot_with_pool,
    list_robots_with_pool,
    set_robot_active_with_pool,
};
use robowatch_engine::views::build_deployment_summaries;
use robowatch_kube::DeploymentManifest;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_repository: Option<String>,
    #[serde(default)]
    pub image_tag: Option<String>,
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default, rename = "nome_robo")]
    pub robot_name: Option<String>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default, rename = "apelido")]
    pub alias: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub depends_on_executions: Option<bool>,
}

fn manifest_for(robot: &Robot, robot_env: Option<String>) -> DeploymentManifest {
    DeploymentManifest {
        name: robot.name.clone(),
        image: format!("{}:{}", robot.image_repository, robot.image_tag),
        replicas: robot.replicas.unwrap_or(1),
        memory_limit: format!("{}Mi", robot.memory_limit_mb),
        robot_name: robot_env,
    }
}

/// Read-through of the processed-deployments snapshot; synthesized once
/// when the poller has not produced it yet.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeploymentSummary>>, ApiError> {
    if let Some(view) = state.cache.deployments_processed.data().await {
        return Ok(Json(view));
    }

    let cluster = state.cache.deployments.data_or_default().await;
    let catalog = list_robots_with_pool(&state.catalog, Some(RobotKind::Deployment)).await?;
    let executions = state.cache.executions.data_or_default().await;

    let view = build_deployment_summaries(&cluster, &catalog, &executions);
    state.cache.deployments_processed.store(view.clone()).await;
    Ok(Json(view))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<Robot>, ApiError> {
    let mut robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Deployment {
        return Err(ApiError::NotFound(format!("'{name}' is not a deployment")));
    }

    // replica counts are realized state, refreshed from the cluster view
    let deployments = state.cache.deployments.data_or_default().await;
    if let Some(live) = deployments.iter().find(|d| d.name == robot.name) {
        robot.replicas = Some(live.replicas.max(0) as u32);
        robot.ready_replicas = Some(live.ready_replicas.max(0) as u32);
        robot.available_replicas = Some(live.available_replicas.max(0) as u32);
    }
    Ok(Json(robot))
}

pub async fn create(
    State(state): State<Arc<AppState>>, Json(request): Json<CreateDeploymentRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (repository, tag) = match (&request.image, &request.image_repository) {
        (Some(image), _) => image
            .rsplit_once(':')
            .map(|(r, t)| (r.to_string(), t.to_string()))
            .unwrap_or_else(|| (image.clone(), "latest".to_string())),
        (None, Some(repository)) => (
            repository.clone(),
            request.image_tag.clone().unwrap_or_else(|| "latest".to_string()),
        ),
        (None, None) => {
            return Err(ApiError::Validation(
                "either image or image_repository (with optional image_tag) is required"
                    .to_string(),
            ))
        }
    };

    let mut robot = Robot::new(request.name.clone(), RobotKind::Deployment);
    robot.alias = request.alias;
    robot.tags = request.tags;
    robot.replicas = request.replicas;
    robot.depends_on_executions = request.depends_on_executions;
    robot.image_repository = repository;
    robot.image_tag = tag;
    robot.memory_limit_mb = request.memory_limit_mb.unwrap_or(256);

    let robot = insert_robot_with_pool(robot, &state.catalog).await?;
    let manifest = manifest_for(&robot, request.robot_name);

    if let Err(e) = state.kube.create_deployment(&manifest).await {
        error!("Deployment creation failed in the cluster: {e}");
        if let Err(rollback) = delete_robot_with_pool(&robot.name, &state.catalog).await {
            error!(
                "Rollback of deployment row '{}' failed: {rollback}",
                robot.name
            );
        }
        return Err(e.into());
    }

    state.cache.deployments.invalidate().await;
    state.cache.deployments_processed.invalidate().await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Deployment created successfully" })),
    ))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kube.delete_deployment(&name).await?;

    match set_robot_active_with_pool(&name, false, &state.catalog).await {
        Ok(_) | Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    state.cache.deployments.invalidate().await;
    state.cache.deployments_processed.invalidate().await;
    Ok(Json(json!({ "message": "Deployment deleted successfully" })))
}

/// Removes the deployment from the cluster but keeps the catalog row, so
/// `activate` can bring it back.
pub async fn standby(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Deployment {
        return Err(ApiError::NotFound(format!("'{name}' is not a deployment")));
    }

    state.kube.delete_deployment(&name).await?;
    set_robot_active_with_pool(&name, false, &state.catalog).await?;

    state.cache.deployments.invalidate().await;
    state.cache.deployments_processed.invalidate().await;
    Ok(Json(json!({ "message": "Deployment moved to standby" })))
}

pub async fn activate(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Deployment {
        return Err(ApiError::NotFound(format!("'{name}' is not a deployment")));
    }

    state.kube.create_deployment(&manifest_for(&robot, None)).await?;
    set_robot_active_with_pool(&name, true, &state.catalog).await?;

    state.cache.deployments.invalidate().await;
    state.cache.deployments_processed.invalidate().await;
    Ok(Json(json!({ "message": "Deployment activated" })))
}
