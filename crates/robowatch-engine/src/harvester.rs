use std::time::{
    Duration,
    Instant,
};

use chrono::{
    Duration as ChronoDuration,
    Utc,
};
use log::{
    error,
    info,
    warn,
};
use sqlx::SqlitePool;

use robowatch_commons::models::cluster::PodInfo;
use robowatch_commons::models::failure::{
    FailureRecord,
    RETENTION_DAYS,
};
use robowatch_commons::naming;
use robowatch_commons::utils::failures::{
    failure_names_with_pool,
    insert_failure_if_absent_with_pool,
    purge_failures_before_with_pool,
};
use robowatch_kube::KubeClient;

use crate::shutdown::Shutdown;

const LOG_TAIL_LINES: u32 = 1000;

/// A pod is harvested when its phase is Failed, its derived status is a
/// failure, or any container is terminated-nonzero / crash-looping.
pub fn is_failed(pod: &PodInfo) -> bool {
    pod.phase == "Failed"
        || pod.status.is_failure()
        || pod.containers.iter().any(|c| c.state.is_failure())
}

/// Detects failed pods, persists them with their last log lines, and
/// enforces the retention window.
pub struct Harvester {
    kube: KubeClient,
    catalog: SqlitePool,
    interval: Duration,
    shutdown: Shutdown,
}

impl Harvester {
    pub fn new(
        kube: KubeClient, catalog: SqlitePool, interval_seconds: u64, shutdown: Shutdown,
    ) -> Self {
        Harvester {
            kube,
            catalog,
            interval: Duration::from_secs(interval_seconds.max(1)),
            shutdown,
        }
    }

    pub async fn run(self) {
        info!("Failure harvester started ({}s interval)", self.interval.as_secs());
        loop {
            let start = Instant::now();
            self.tick().await;

            let elapsed = start.elapsed();
            let wait = self.interval.saturating_sub(elapsed);
            if !self.shutdown.interruptible_sleep(wait).await {
                break;
            }
        }
        info!("Failure harvester stopped");
    }

    pub async fn tick(&self) {
        // own, unfiltered listing: the shared pods snapshot only keeps
        // running pods
        let pods = match self.kube.list_pods(None).await {
            Ok(pods) => pods,
            Err(e) => {
                warn!("Failed to list pods for failure harvest: {e}");
                return;
            }
        };

        let known = match failure_names_with_pool(&self.catalog).await {
            Ok(names) => names,
            Err(e) => {
                error!("Failure table unavailable: {e}");
                return;
            }
        };

        for pod in pods.iter().filter(|pod| is_failed(pod)) {
            if known.contains(&pod.name) {
                continue;
            }
            self.capture(pod).await;
        }

        let cutoff = Utc::now() - ChronoDuration::days(RETENTION_DAYS);
        if let Err(e) = purge_failures_before_with_pool(cutoff, &self.catalog).await {
            error!("Failed to purge stale failure records: {e}");
        }
    }

    async fn capture(&self, pod: &PodInfo) {
        let logs = match self.kube.pod_logs(&pod.name, LOG_TAIL_LINES).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Could not fetch logs for failed pod {}: {e}", pod.name);
                String::new()
            }
        };

        let record = FailureRecord {
            id: None,
            name: pod.name.clone(),
            namespace: pod.namespace.clone(),
            labels: pod.labels.clone(),
            phase: pod.phase.clone(),
            status: pod.status.to_string(),
            start_time: pod.start_time.clone(),
            containers: pod.containers.clone(),
            logs,
            robot_name: Some(naming::robot_slug(&pod.labels, &pod.name)),
            failed_at: Utc::now(),
        };

        match insert_failure_if_absent_with_pool(record, &self.catalog).await {
            Ok(true) => info!("Failure recorded for pod {}", pod.name),
            Ok(false) => {}
            Err(e) => error!("Failed to persist failure for pod {}: {e}", pod.name),
        }
    }
}
