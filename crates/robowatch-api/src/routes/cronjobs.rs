use std::sync::Arc;

use axum::extract::{
    Path,
    State,
};
use axum::http::StatusCode;
use axum::Json;
use log::{
    error,
    info,
};
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::execution::pending_count;
use robowatch_commons::models::robot::{
    Robot,
    RobotKind,
};
use robowatch_commons::models::views::CronjobSummary;
use robowatch_commons::naming;
use robowatch_commons::utils::error::StoreError;
use robowatch_commons::utils::robots::{
    delete_robot_with_pool,
    get_robot_with_pool,
    insert_robot_with_pool,
    list_robots_with_pool,
    set_cronjob_suspended_with_pool,
};
use robowatch_engine::views::build_cronjob_summaries;
use robowatch_kube::CronjobManifest;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCronjobRequest {
    pub name: String,
    pub schedule: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_repository: Option<String>,
    #[serde(default)]
    pub image_tag: Option<String>,
    #[serde(default, rename = "nome_robo")]
    pub robot_name: Option<String>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
    #[serde(default)]
    pub ttl_seconds_after_finished: Option<u64>,
    #[serde(default, rename = "apelido")]
    pub alias: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub depends_on_executions: Option<bool>,
}

/// Resolves the image reference: a full image wins, else repository:tag.
fn resolve_image(request: &CreateCronjobRequest) -> Result<(String, String, String), ApiError> {
    if let Some(image) = &request.image {
        let (repository, tag) = image
            .rsplit_once(':')
            .map(|(r, t)| (r.to_string(), t.to_string()))
            .unwrap_or_else(|| (image.clone(), "latest".to_string()));
        return Ok((image.clone(), repository, tag));
    }
    match (&request.image_repository, &request.image_tag) {
        (Some(repository), Some(tag)) => {
            Ok((format!("{repository}:{tag}"), repository.clone(), tag.clone()))
        }
        (Some(repository), None) => Ok((
            format!("{repository}:latest"),
            repository.clone(),
            "latest".to_string(),
        )),
        _ => Err(ApiError::Validation(
            "either image or image_repository (with optional image_tag) is required".to_string(),
        )),
    }
}

/// Read-through of the processed-cronjobs snapshot; synthesized once when
/// the poller has not produced it yet.
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CronjobSummary>>, ApiError> {
    if let Some(view) = state.cache.cronjobs_processed.data().await {
        return Ok(Json(view));
    }

    let cluster = state.cache.cronjobs.data_or_default().await;
    let catalog = list_robots_with_pool(&state.catalog, Some(RobotKind::Cronjob)).await?;
    let executions = state.cache.executions.data_or_default().await;

    let view = build_cronjob_summaries(&cluster, &catalog, &executions);
    state.cache.cronjobs_processed.store(view.clone()).await;
    Ok(Json(view))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let robot = get_robot_with_pool(&name, &state.catalog).await?;
    if robot.kind != RobotKind::Cronjob {
        return Err(ApiError::NotFound(format!("'{name}' is not a cronjob")));
    }

    let executions = state.cache.executions.data_or_default().await;
    let pending = if robot.depends_on_executions.unwrap_or(true) {
        pending_count(&naming::cronjob_robot_name(&robot.name), &executions)
    } else {
        0
    };

    let mut body = serde_json::to_value(&robot)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    body["execucoes_pendentes"] = json!(pending);
    Ok(Json(body))
}

pub async fn create(
    State(state): State<Arc<AppState>>, Json(request): Json<CreateCronjobRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let (image, repository, tag) = resolve_image(&request)?;
    let memory_limit_mb = request.memory_limit_mb.unwrap_or(256);

    let mut robot = Robot::new(request.name.clone(), RobotKind::Cronjob);
    robot.alias = request.alias;
    robot.tags = request.tags;
    robot.schedule = Some(request.schedule.clone());
    robot.timezone = request.timezone.clone();
    robot.ttl_seconds_after_finished = request.ttl_seconds_after_finished;
    robot.depends_on_executions = request.depends_on_executions;
    robot.image_repository = repository;
    robot.image_tag = tag;
    robot.memory_limit_mb = memory_limit_mb;

    let robot = insert_robot_with_pool(robot, &state.catalog).await?;

    let manifest = CronjobManifest {
        name: robot.name.clone(),
        schedule: request.schedule,
        timezone: robot
            .timezone
            .clone()
            .unwrap_or_else(|| "America/Sao_Paulo".to_string()),
        image,
        robot_name: request.robot_name,
        memory_limit: format!("{memory_limit_mb}Mi"),
        ttl_seconds_after_finished: robot.ttl_seconds_after_finished.unwrap_or(60),
    };

    if let Err(e) = state.kube.create_cronjob(&manifest).await {
        // roll the catalog row back so the name stays free
        error!("Cronjob creation failed in the cluster: {e}");
        if let Err(rollback) = delete_robot_with_pool(&robot.name, &state.catalog).await {
            error!("Rollback of cronjob row '{}' failed: {rollback}", robot.name);
        }
        return Err(e.into());
    }

    state.cache.cronjobs.invalidate().await;
    state.cache.cronjobs_processed.invalidate().await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Cronjob created successfully" })),
    ))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kube.delete_cronjob(&name).await?;

    // a cronjob applied outside the catalog has no row to deactivate
    match robowatch_commons::utils::robots::set_robot_active_with_pool(
        &name,
        false,
        &state.catalog,
    )
    .await
    {
        Ok(_) | Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    state.cache.cronjobs.invalidate().await;
    state.cache.cronjobs_processed.invalidate().await;
    Ok(Json(json!({ "message": "Cronjob deleted successfully" })))
}

/// Suspends the cronjob and drains its in-flight jobs.
pub async fn standby(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kube.suspend_cronjob(&name).await?;

    let jobs = state.cache.jobs.data_or_default().await;
    let prefix = format!("{name}-");
    let mut deleted = 0u32;
    for job in jobs.iter().filter(|job| job.name.starts_with(&prefix)) {
        match state.kube.delete_job(&job.name).await {
            Ok(()) => deleted += 1,
            Err(e) => error!("Failed to delete in-flight job {}: {e}", job.name),
        }
    }

    match set_cronjob_suspended_with_pool(&name, true, &state.catalog).await {
        Ok(_) | Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    state.cache.jobs.invalidate().await;
    state.cache.cronjobs.invalidate().await;
    state.cache.cronjobs_processed.invalidate().await;
    info!("Cronjob {name} suspended, {deleted} in-flight job(s) deleted");
    Ok(Json(json!({
        "message": "Cronjob suspended",
        "jobs_deletados": deleted
    })))
}

pub async fn activate(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.kube.unsuspend_cronjob(&name).await?;

    match set_cronjob_suspended_with_pool(&name, false, &state.catalog).await {
        Ok(_) | Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    state.cache.cronjobs.invalidate().await;
    state.cache.cronjobs_processed.invalidate().await;
    Ok(Json(json!({ "message": "Cronjob activated" })))
}

pub async fn run_now(
    State(state): State<Arc<AppState>>, Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job_name = state.kube.create_job_from_cronjob(&name).await?;
    state.cache.jobs.invalidate().await;
    Ok(Json(json!({
        "message": "Job created from cronjob",
        "job_name": job_name
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(image: Option<&str>, repository: Option<&str>, tag: Option<&str>) -> CreateCronjobRequest {
        CreateCronjobRequest {
            name: "daily-export".to_string(),
            schedule: "0 6 * * *".to_string(),
            timezone: None,
            image: image.map(str::to_string),
            image_repository: repository.map(str::to_string),
            image_tag: tag.map(str::to_string),
            robot_name: None,
            memory_limit_mb: None,
            ttl_seconds_after_finished: None,
            alias: None,
            tags: Vec::new(),
            depends_on_executions: None,
        }
    }

    #[test]
    fn test_resolve_image_full_reference() {
        let (image, repository, tag) =
            resolve_image(&request(Some("rpaglobal/daily_export:v2"), None, None)).unwrap();
        assert_eq!(image, "rpaglobal/daily_export:v2");
        assert_eq!(repository, "rpaglobal/daily_export");
        assert_eq!(tag, "v2");
    }

    #[test]
    fn test_resolve_image_repository_and_tag() {
        let (image, _, tag) =
            resolve_image(&request(None, Some("rpaglobal/daily_export"), Some("v2"))).unwrap();
        assert_eq!(image, "rpaglobal/daily_export:v2");
        assert_eq!(tag, "v2");
    }

    #[test]
    fn test_resolve_image_repository_defaults_tag() {
        let (image, _, tag) =
            resolve_image(&request(None, Some("rpaglobal/daily_export"), None)).unwrap();
        assert_eq!(image, "rpaglobal/daily_export:latest");
        assert_eq!(tag, "latest");
    }

    #[test]
    fn test_resolve_image_missing() {
        let err = resolve_image(&request(None, None, None)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
