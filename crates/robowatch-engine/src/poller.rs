use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use log::{
    debug,
    info,
    warn,
};
use sqlx::SqlitePool;

use robowatch_commons::cache::Cache;
use robowatch_commons::models::robot::RobotKind;
use robowatch_commons::utils::robots::{
    list_active_robots_with_pool,
    list_robots_with_pool,
};
use robowatch_kube::KubeClient;
use robowatch_remote::vm::fetch_vm_resources;
use robowatch_remote::{
    ExecutionsDb,
    SshSession,
};

use crate::shutdown::Shutdown;
use crate::views;

/// Cluster-side polling loop: refreshes the jobs/pods/cronjobs/deployments
/// snapshots, the derived views that depend on them, the VM telemetry and
/// the aggregate SSH health, in that order.
pub struct ClusterPoller {
    kube: KubeClient,
    ssh: Arc<SshSession>,
    catalog: SqlitePool,
    cache: Arc<Cache>,
    interval: Duration,
    shutdown: Shutdown,
}

impl ClusterPoller {
    pub fn new(
        kube: KubeClient, ssh: Arc<SshSession>, catalog: SqlitePool, cache: Arc<Cache>,
        interval_seconds: u64, shutdown: Shutdown,
    ) -> Self {
        ClusterPoller {
            kube,
            ssh,
            catalog,
            cache,
            interval: Duration::from_secs(interval_seconds.max(1)),
            shutdown,
        }
    }

    pub async fn run(self) {
        info!("Cluster poller started ({}s interval)", self.interval.as_secs());
        loop {
            let start = Instant::now();
            self.tick().await;

            let elapsed = start.elapsed();
            let wait = self.interval.saturating_sub(elapsed);
            if !self.shutdown.interruptible_sleep(wait).await {
                break;
            }
        }
        info!("Cluster poller stopped");
    }

    pub async fn tick(&self) {
        let mut errors: Vec<String> = Vec::new();

        match self.kube.list_jobs(None).await {
            Ok(jobs) => self.cache.jobs.store(jobs).await,
            Err(e) => {
                warn!("Failed to refresh jobs snapshot: {e}");
                errors.push(format!("jobs: {e}"));
                self.cache.jobs.store_error(e.to_string()).await;
            }
        }

        match self.kube.list_pods(None).await {
            Ok(all_pods) => {
                let total = all_pods.len();
                let running: Vec<_> = all_pods
                    .into_iter()
                    .filter(|pod| pod.phase == "Running")
                    .collect();
                debug!("Pods snapshot refreshed: {} running of {} total", running.len(), total);
                self.cache.pods.store(running).await;
            }
            Err(e) => {
                warn!("Failed to refresh pods snapshot: {e}");
                errors.push(format!("pods: {e}"));
                self.cache.pods.store_error(e.to_string()).await;
            }
        }

        match self.kube.list_cronjobs().await {
            Ok(cronjobs) => {
                self.cache.cronjobs.store(cronjobs.clone()).await;
                self.refresh_cronjob_view(&cronjobs).await;
            }
            Err(e) => {
                warn!("Failed to refresh cronjobs snapshot: {e}");
                errors.push(format!("cronjobs: {e}"));
                self.cache.cronjobs.store_error(e.to_string()).await;
            }
        }

        match self.kube.list_deployments().await {
            Ok(deployments) => {
                self.cache.deployments.store(deployments.clone()).await;
                self.refresh_deployment_view(&deployments).await;
            }
            Err(e) => {
                warn!("Failed to refresh deployments snapshot: {e}");
                errors.push(format!("deployments: {e}"));
                self.cache.deployments.store_error(e.to_string()).await;
            }
        }

        match fetch_vm_resources(&self.ssh).await {
            Ok(resources) => self.cache.vm_resources.store(resources).await,
            Err(e) => {
                warn!("Failed to refresh VM resources: {e}");
                errors.push(format!("vm_resources: {e}"));
                self.cache.vm_resources.store_error(e.to_string()).await;
            }
        }

        let ssh_ok = errors.is_empty();
        let ssh_error = if ssh_ok { None } else { Some(errors.join("; ")) };
        self.cache
            .connection_status
            .update_with(|status| status.apply(Some(ssh_ok), ssh_error, None, None))
            .await;
    }

    async fn refresh_cronjob_view(
        &self, cronjobs: &[robowatch_commons::models::cluster::CronjobInfo],
    ) {
        let catalog = match list_robots_with_pool(&self.catalog, Some(RobotKind::Cronjob)).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("Skipping cronjob view refresh, catalog unavailable: {e}");
                return;
            }
        };
        let executions = self.cache.executions.data_or_default().await;
        let view = views::build_cronjob_summaries(cronjobs, &catalog, &executions);
        self.cache.cronjobs_processed.store(view).await;
    }

    async fn refresh_deployment_view(
        &self, deployments: &[robowatch_commons::models::cluster::DeploymentInfo],
    ) {
        let catalog = match list_robots_with_pool(&self.catalog, Some(RobotKind::Deployment)).await
        {
            Ok(rows) => rows,
            Err(e) => {
                debug!("Skipping deployment view refresh, catalog unavailable: {e}");
                return;
            }
        };
        let executions = self.cache.executions.data_or_default().await;
        let view = views::build_deployment_summaries(deployments, &catalog, &executions);
        self.cache.deployments_processed.store(view).await;
    }
}

/// Executions-side polling loop: drains the pending-executions query into
/// the cache and rebuilds the RPA view.
pub struct DbPoller {
    db: Arc<ExecutionsDb>,
    catalog: SqlitePool,
    cache: Arc<Cache>,
    interval: Duration,
    shutdown: Shutdown,
}

impl DbPoller {
    pub fn new(
        db: Arc<ExecutionsDb>, catalog: SqlitePool, cache: Arc<Cache>, interval_seconds: u64,
        shutdown: Shutdown,
    ) -> Self {
        DbPoller {
            db,
            catalog,
            cache,
            interval: Duration::from_secs(interval_seconds.max(1)),
            shutdown,
        }
    }

    pub async fn run(self) {
        info!("DB poller started ({}s interval)", self.interval.as_secs());
        loop {
            let start = Instant::now();
            self.tick().await;

            let elapsed = start.elapsed();
            let wait = self.interval.saturating_sub(elapsed);
            if !self.shutdown.interruptible_sleep(wait).await {
                break;
            }
        }
        info!("DB poller stopped");
    }

    pub async fn tick(&self) {
        let active_rpas = match list_active_robots_with_pool(&self.catalog, Some(RobotKind::Rpa))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Catalog unavailable, skipping executions refresh: {e}");
                Vec::new()
            }
        };

        let jobs = self.cache.jobs.data_or_default().await;
        let names = views::collect_rpa_names(&active_rpas, &jobs);

        let executions = self.db.executions_for(&names).await;
        self.cache.executions.store(executions.clone()).await;

        // the catalog list view includes standby robots
        let all_rpas = match list_robots_with_pool(&self.catalog, Some(RobotKind::Rpa)).await {
            Ok(rows) => rows,
            Err(e) => {
                debug!("Skipping RPA view refresh, catalog unavailable: {e}");
                Vec::new()
            }
        };
        let view = views::build_rpa_summaries(&all_rpas, &executions, &jobs);
        self.cache.rpas_processed.store(view).await;

        let (mysql_ok, message) = self.db.probe().await;
        let mysql_error = if mysql_ok { None } else { Some(message) };
        self.cache
            .connection_status
            .update_with(|status| status.apply(None, None, Some(mysql_ok), mysql_error))
            .await;
    }
}
