use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use log::{
    debug,
    error,
    info,
    warn,
};
use sqlx::SqlitePool;

use robowatch_commons::cache::Cache;
use robowatch_commons::config::PathsConfig;
use robowatch_commons::models::execution::{
    pending_count,
    ExecutionsMap,
};
use robowatch_commons::models::robot::{
    Robot,
    RobotKind,
};
use robowatch_commons::utils::robots::list_active_robots_with_pool;
use robowatch_kube::{
    CreateJobParams,
    KubeClient,
    KubeError,
};

use crate::shutdown::Shutdown;

const RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

/// One admission pass for a single RPA: if the executions snapshot holds
/// pending rows for it, create jobs up to the free-slot count. Zero free
/// slots is a no-op, not an error.
pub async fn reconcile_robot(
    kube: &KubeClient, robot: &Robot, executions: &ExecutionsMap,
) -> Result<u32, KubeError> {
    let pending = pending_count(&robot.name, executions);
    if pending == 0 {
        return Ok(0);
    }

    info!(
        "{} pending execution(s) for RPA {}",
        pending, robot.name
    );
    let params = CreateJobParams::from_robot(robot);
    kube.create_job(&params).await
}

/// Turns pending executions into capacity-bounded Jobs and keeps the
/// remote manifest directories applied. Failures are logged and the next
/// tick retries naturally.
pub struct Reconciler {
    kube: KubeClient,
    catalog: SqlitePool,
    cache: Arc<Cache>,
    paths: PathsConfig,
    shutdown: Shutdown,
}

impl Reconciler {
    pub fn new(
        kube: KubeClient, catalog: SqlitePool, cache: Arc<Cache>, paths: PathsConfig,
        shutdown: Shutdown,
    ) -> Self {
        Reconciler {
            kube,
            catalog,
            cache,
            paths,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(
            "Reconciler started ({}s interval)",
            RECONCILE_INTERVAL.as_secs()
        );
        loop {
            let start = Instant::now();
            self.tick().await;

            let elapsed = start.elapsed();
            let wait = RECONCILE_INTERVAL.saturating_sub(elapsed);
            if !self.shutdown.interruptible_sleep(wait).await {
                break;
            }
        }
        info!("Reconciler stopped");
    }

    pub async fn tick(&self) {
        let rpas = match list_active_robots_with_pool(&self.catalog, Some(RobotKind::Rpa)).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Catalog unavailable, skipping reconcile tick: {e}");
                return;
            }
        };

        let executions = self.cache.executions.data_or_default().await;

        for robot in &rpas {
            match reconcile_robot(&self.kube, robot, &executions).await {
                Ok(0) => {}
                Ok(created) => info!("Created {created} job(s) for {}", robot.name),
                Err(e) => {
                    // next tick re-observes the remaining pending rows
                    error!("Failed to reconcile {}: {e}", robot.name);
                }
            }
        }

        self.sync_cronjob_manifests().await;
        self.sync_deployment_manifests().await;
    }

    /// Applies every cronjob manifest in the remote directory whose
    /// resource does not exist in the cluster yet.
    async fn sync_cronjob_manifests(&self) {
        let Some(dir) = self.paths.cronjobs_path.as_deref() else {
            return;
        };

        let files = match self.kube.ssh().list(dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list {dir}: {e}");
                return;
            }
        };

        for file in files.iter().filter(|f| is_manifest(f)) {
            let path = format!("{dir}/{file}");
            let Some(name) = self.manifest_resource_name(&path).await else {
                continue;
            };

            match self.kube.cronjob_exists(&name).await {
                Ok(true) => {}
                Ok(false) => match self.kube.apply_cronjob(&path).await {
                    Ok(()) => info!("Cronjob {name} applied from {path}"),
                    Err(e) => error!("Failed to apply cronjob {path}: {e}"),
                },
                Err(e) => debug!("Skipping {path}, existence probe failed: {e}"),
            }
        }
    }

    /// Deployments are re-applied unconditionally; `kubectl apply` is
    /// idempotent for unchanged manifests.
    async fn sync_deployment_manifests(&self) {
        let Some(dir) = self.paths.deployments_path.as_deref() else {
            return;
        };

        let files = match self.kube.ssh().list(dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list {dir}: {e}");
                return;
            }
        };

        for file in files.iter().filter(|f| is_manifest(f)) {
            let path = format!("{dir}/{file}");
            if self.manifest_resource_name(&path).await.is_none() {
                continue;
            }
            match self.kube.apply_deployment(&path).await {
                Ok(()) => debug!("Deployment manifest {path} applied"),
                Err(e) => error!("Failed to apply deployment {path}: {e}"),
            }
        }
    }

    async fn manifest_resource_name(&self, remote_path: &str) -> Option<String> {
        let bytes = match self.kube.ssh().get(remote_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {remote_path}: {e}");
                return None;
            }
        };

        match parse_manifest_name(&bytes) {
            Some(name) => Some(name),
            None => {
                warn!("Manifest {remote_path} has no metadata.name, skipping");
                None
            }
        }
    }
}

fn is_manifest(file_name: &str) -> bool {
    file_name.ends_with(".yaml") || file_name.ends_with(".yml") || file_name.ends_with(".json")
}

fn parse_manifest_name(bytes: &[u8]) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_slice(bytes).ok()?;
    value
        .get("metadata")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}
