use std::collections::HashMap;

use robowatch_commons::models::cluster::{
    CronjobInfo,
    DeploymentInfo,
    JobInfo,
    PodInfo,
    PodStatus,
};
use robowatch_commons::models::execution::{
    pending_count,
    ExecutionsMap,
};
use robowatch_commons::models::robot::{
    Robot,
    RobotKind,
};
use robowatch_commons::models::views::{
    CronjobSummary,
    DeploymentSummary,
    RpaSummary,
    StatusBucket,
};
use robowatch_commons::naming;

/// Active job pods per robot slug, from the jobs snapshot alone.
pub fn active_jobs_by_robot(jobs: &[JobInfo]) -> HashMap<String, i64> {
    let mut counts = HashMap::new();
    for job in jobs {
        let slug = job
            .labels
            .get("nome_robo")
            .or_else(|| job.labels.get("nome-robo"))
            .or_else(|| job.labels.get("app"))
            .map(|s| s.to_lowercase());
        let Some(slug) = slug else { continue };
        if slug.is_empty() || job.active == 0 {
            continue;
        }
        *counts.entry(slug).or_insert(0) += job.active;
    }
    counts
}

/// Catalog RPAs enriched with pending-queue depth and live job counts.
pub fn build_rpa_summaries(
    robots: &[Robot], executions: &ExecutionsMap, jobs: &[JobInfo],
) -> Vec<RpaSummary> {
    let jobs_by_robot = active_jobs_by_robot(jobs);

    robots
        .iter()
        .filter(|robot| robot.kind == RobotKind::Rpa)
        .map(|robot| RpaSummary {
            robot: robot.clone(),
            execucoes_pendentes: pending_count(&robot.name, executions),
            jobs_ativos: *jobs_by_robot
                .get(&robot.name.to_lowercase())
                .unwrap_or(&0),
        })
        .collect()
}

/// Cluster cronjobs overlaid with catalog metadata and queue depth.
pub fn build_cronjob_summaries(
    cluster: &[CronjobInfo], catalog: &[Robot], executions: &ExecutionsMap,
) -> Vec<CronjobSummary> {
    let by_name: HashMap<&str, &Robot> = catalog
        .iter()
        .filter(|r| r.kind == RobotKind::Cronjob)
        .map(|r| (r.name.as_str(), r))
        .collect();

    cluster
        .iter()
        .filter(|cj| !cj.name.is_empty())
        .map(|cj| {
            let row = by_name.get(cj.name.as_str());
            let alias = row
                .and_then(|r| r.alias.clone())
                .unwrap_or_default();
            let mut tags = row.map(|r| r.tags.clone()).unwrap_or_default();
            if !tags.iter().any(|t| t == "Agendado") {
                tags.push("Agendado".to_string());
            }
            let depends = row
                .and_then(|r| r.depends_on_executions)
                .unwrap_or(true);

            let pending = if depends {
                let robot_name = naming::cronjob_robot_name(&cj.name);
                pending_count(&robot_name, executions)
            } else {
                0
            };

            CronjobSummary {
                cronjob: cj.clone(),
                alias,
                tags,
                dependente_de_execucoes: depends,
                execucoes_pendentes: pending,
            }
        })
        .collect()
}

/// Cluster deployments overlaid with catalog metadata and queue depth.
pub fn build_deployment_summaries(
    cluster: &[DeploymentInfo], catalog: &[Robot], executions: &ExecutionsMap,
) -> Vec<DeploymentSummary> {
    let by_name: HashMap<&str, &Robot> = catalog
        .iter()
        .filter(|r| r.kind == RobotKind::Deployment)
        .map(|r| (r.name.as_str(), r))
        .collect();

    cluster
        .iter()
        .filter(|dep| !dep.name.is_empty())
        .map(|dep| {
            let row = by_name.get(dep.name.as_str());
            let alias = row
                .and_then(|r| r.alias.clone())
                .unwrap_or_default();
            let mut tags = row.map(|r| r.tags.clone()).unwrap_or_default();
            if !tags.iter().any(|t| t == "24/7") {
                tags.push("24/7".to_string());
            }
            let depends = row
                .and_then(|r| r.depends_on_executions)
                .unwrap_or(true);

            let pending = if depends {
                let robot_name = naming::deployment_robot_name(&dep.name);
                pending_count(&robot_name, executions)
            } else {
                0
            };

            DeploymentSummary {
                deployment: dep.clone(),
                alias,
                tags,
                dependente_de_execucoes: depends,
                execucoes_pendentes: pending,
            }
        })
        .collect()
}

/// Names to query the executions database for: active catalog RPAs plus
/// robots inferred from the jobs snapshot, case-corrected against the
/// catalog spelling.
pub fn collect_rpa_names(active_rpas: &[Robot], jobs: &[JobInfo]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    let by_lower: HashMap<String, &str> = active_rpas
        .iter()
        .map(|r| (r.name.to_lowercase(), r.name.as_str()))
        .collect();

    let mut push = |name: String| {
        if name.is_empty() {
            return;
        }
        let canonical = by_lower
            .get(&name.to_lowercase())
            .map(|s| s.to_string())
            .unwrap_or(name);
        if seen.insert(canonical.clone()) {
            names.push(canonical);
        }
    };

    for robot in active_rpas {
        push(robot.name.clone());
    }

    for job in jobs {
        let raw = job
            .labels
            .get("nome_robo")
            .or_else(|| job.labels.get("nome-robo"))
            .or_else(|| job.labels.get("app"))
            .cloned()
            .unwrap_or_else(|| job.name.clone());
        if raw.is_empty() {
            continue;
        }
        push(raw.clone());
        let cleaned = naming::slug_from_resource_name(&raw);
        if cleaned != raw {
            push(cleaned);
        }
    }

    names
}

fn kind_label(kind: RobotKind) -> &'static str {
    match kind {
        RobotKind::Rpa => "RPA",
        RobotKind::Cronjob => "Cronjob",
        RobotKind::Deployment => "Deploy",
    }
}

/// Dashboard aggregation: job and pod counters grouped by robot slug.
/// Buckets with the same normalized slug merge; `Unknown` only survives
/// with active or failed pods.
pub fn build_dashboard(
    jobs: &[JobInfo], pods: &[PodInfo], robots: &[Robot], executions: &ExecutionsMap,
) -> HashMap<String, StatusBucket> {
    // keyed by the normalized slug so label and name spellings merge
    let mut buckets: HashMap<String, (String, StatusBucket)> = HashMap::new();

    fn entry_for<'a>(
        buckets: &'a mut HashMap<String, (String, StatusBucket)>, slug: String,
        kind_label: &str,
    ) -> &'a mut StatusBucket {
        let (key, display) = if slug.is_empty() {
            ("unknown".to_string(), "Unknown".to_string())
        } else {
            (naming::normalize(&slug), slug)
        };
        let entry = buckets.entry(key).or_insert_with(|| {
            (
                display,
                StatusBucket {
                    kind_label: kind_label.to_string(),
                    ..StatusBucket::default()
                },
            )
        });
        // cronjob identification wins over the RPA default
        if kind_label == "Cronjob" {
            entry.1.kind_label = "Cronjob".to_string();
        }
        &mut entry.1
    }

    for job in jobs {
        let slug = naming::robot_slug(&job.labels, &job.name);
        let label = if job.name.to_lowercase().contains("cronjob") {
            "Cronjob"
        } else {
            "RPA"
        };
        let bucket = entry_for(&mut buckets, slug, label);
        bucket.running += job.active;
        bucket.failed += job.failed;
        bucket.succeeded += job.completions;
    }

    for pod in pods {
        if pod.is_job_pod() {
            continue;
        }
        if pod.status != PodStatus::Running && pod.status != PodStatus::Pending {
            continue;
        }
        let slug = naming::robot_slug(&pod.labels, &pod.name);
        let bucket = entry_for(&mut buckets, slug, "Deploy");
        match pod.status {
            PodStatus::Running => bucket.running += 1,
            PodStatus::Pending => bucket.pending += 1,
            _ => {}
        }
    }

    // catalog overlay: alias, variant label and pending executions
    for (key, (display, bucket)) in buckets.iter_mut() {
        if key == "unknown" {
            continue;
        }
        if let Some(robot) = robots
            .iter()
            .find(|r| naming::normalize(&r.name) == *key)
        {
            bucket.alias = robot.alias.clone().unwrap_or_default();
            bucket.kind_label = kind_label(robot.kind).to_string();
            *display = robot.name.to_lowercase();
        }
        bucket.execucoes_pendentes = pending_count(display, executions);
    }

    buckets
        .into_iter()
        .filter(|(key, (_, bucket))| {
            key != "unknown" || bucket.running > 0 || bucket.failed > 0
        })
        .map(|(_, (display, bucket))| (display, bucket))
        .collect()
}
