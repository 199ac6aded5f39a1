use std::collections::HashMap;

use log::{
    info,
    warn,
};
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::cluster::{
    JobInfo,
    PodInfo,
    PodStatus,
};

use crate::client::{
    KubeClient,
    KubeList,
    RawContainerSpec,
    RawMetadata,
};
use crate::error::KubeError;

#[derive(Debug, Default, Deserialize)]
struct RawJob {
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default)]
    spec: RawJobSpec,
    #[serde(default)]
    status: RawJobStatus,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobSpec {
    #[serde(default)]
    template: RawJobTemplate,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobTemplate {
    #[serde(default)]
    spec: RawJobPodSpec,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobPodSpec {
    #[serde(default)]
    containers: Vec<RawContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobStatus {
    #[serde(default)]
    active: i64,
    #[serde(default)]
    failed: i64,
    #[serde(default)]
    succeeded: i64,
    #[serde(default, rename = "startTime")]
    start_time: String,
    #[serde(default, rename = "completionTime")]
    completion_time: String,
}

/// Parameters for an RPA job admission pass.
#[derive(Clone, Debug)]
pub struct CreateJobParams {
    pub robot_name: String,
    pub image_tag: String,
    pub memory_limit_mb: u64,
    pub max_instances: u32,
    pub external_files: bool,
    pub lifetime_seconds: u64,
}

impl CreateJobParams {
    /// Admission parameters from a catalog RPA record.
    pub fn from_robot(robot: &robowatch_commons::models::robot::Robot) -> Self {
        CreateJobParams {
            robot_name: robot.name.clone(),
            image_tag: robot.image_tag.clone(),
            memory_limit_mb: robot.memory_limit_mb,
            max_instances: robot.max_instances.unwrap_or(1),
            external_files: robot.external_files.unwrap_or(false),
            lifetime_seconds: robot.lifetime_seconds.unwrap_or(600),
        }
    }
}

/// Memory limit for the manifest: MB scaled into MiB, floored.
pub fn memory_limit_mib(memory_mb: u64) -> u64 {
    memory_mb * 1000 / 1024
}

/// Slug used in generated resource names: lowercase, underscores folded
/// to dashes.
pub fn job_name_slug(robot_name: &str) -> String {
    robot_name.to_lowercase().replace('_', "-")
}

/// Jobs still counting against a robot's instance cap: active pods plus
/// job pods the scheduler has not started yet.
pub fn active_instances(jobs: &[JobInfo], pods: &[PodInfo]) -> i64 {
    let from_jobs: i64 = jobs.iter().map(|job| job.active).sum();
    let pending_pods = pods
        .iter()
        .filter(|pod| pod.is_job_pod() && pod.phase == "Pending")
        .count() as i64;
    from_jobs + pending_pods
}

/// Builds one Job manifest for the given instance number.
pub fn build_job_manifest(params: &CreateJobParams, instance: u32) -> serde_json::Value {
    let name_lower = params.robot_name.to_lowercase();
    let slug = job_name_slug(&params.robot_name);
    let memory = memory_limit_mib(params.memory_limit_mb);

    let mut manifest = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "generateName": format!("rpa-job-{slug}-"),
            "labels": {
                "nome_robo": name_lower,
                "instancia": instance.to_string()
            }
        },
        "spec": {
            "activeDeadlineSeconds": params.lifetime_seconds,
            "ttlSecondsAfterFinished": 10,
            "template": {
                "spec": {
                    "restartPolicy": "Never",
                    "imagePullSecrets": [{"name": "docker-hub-secret"}],
                    "containers": [{
                        "name": "rpa",
                        "image": format!("rpaglobal/{name_lower}:{}", params.image_tag),
                        "imagePullPolicy": "Always",
                        "env": [{
                            "name": "NOME_ROBO",
                            "value": name_lower
                        }],
                        "resources": {
                            "limits": {
                                "memory": format!("{memory}Mi")
                            }
                        }
                    }]
                }
            }
        }
    });

    if params.external_files {
        let pod_spec = &mut manifest["spec"]["template"]["spec"];
        pod_spec["containers"][0]["volumeMounts"] = json!([{
            "name": "auxiliar-volume",
            "mountPath": "/app/pasta_de_arquivos_auxiliares"
        }]);
        pod_spec["volumes"] = json!([{
            "name": "auxiliar-volume",
            "hostPath": {
                "path": "/mnt/k8s/honorarios/pasta_de_arquivos_auxiliares",
                "type": "Directory"
            }
        }]);
    }

    manifest
}

impl KubeClient {
    pub async fn list_jobs(&self, selector: Option<&str>) -> Result<Vec<JobInfo>, KubeError> {
        let mut command = "kubectl get jobs -o json".to_string();
        if let Some(selector) = selector {
            command.push_str(&format!(" -l {selector}"));
        }

        let list: KubeList<RawJob> = self.kubectl_json(&command).await?;

        // pods refine each job's status and report the running image
        let pods = self.list_pods(selector).await.unwrap_or_default();
        let mut pods_by_job: HashMap<String, Vec<&PodInfo>> = HashMap::new();
        for pod in &pods {
            if let Some(job_name) = pod.labels.get("job-name") {
                pods_by_job.entry(job_name.clone()).or_default().push(pod);
            }
        }

        Ok(list
            .items
            .into_iter()
            .map(|raw| job_from_raw(raw, &pods_by_job))
            .collect())
    }

    /// Active job count for a robot, used to compute free slots.
    pub async fn count_active_jobs(&self, robot_name: &str) -> Result<i64, KubeError> {
        let selector = format!("nome_robo={}", robot_name.to_lowercase());
        let jobs = self.list_jobs(Some(&selector)).await?;
        let pods = self.list_pods(Some(&selector)).await?;
        Ok(active_instances(&jobs, &pods))
    }

    /// Creates as many Jobs as the robot has free slots. Zero free slots
    /// is a successful no-op. Returns how many Jobs were created.
    pub async fn create_job(&self, params: &CreateJobParams) -> Result<u32, KubeError> {
        let active = self.count_active_jobs(&params.robot_name).await?;
        let slots = (params.max_instances as i64 - active).max(0) as u32;

        if slots == 0 {
            warn!(
                "Instance cap reached for {} ({} active)",
                params.robot_name, active
            );
            return Ok(0);
        }

        for instance in 1..=slots {
            let manifest = build_job_manifest(params, instance);
            self.kubectl_create_stdin(&manifest).await?;
        }

        info!("Created {} job(s) for {}", slots, params.robot_name);
        Ok(slots)
    }

    pub async fn delete_job(&self, name: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!("kubectl delete job {name}")).await
    }
}

fn job_from_raw(raw: RawJob, pods_by_job: &HashMap<String, Vec<&PodInfo>>) -> JobInfo {
    let name = raw.metadata.name.clone();

    let mut status = if raw.status.active > 0 {
        PodStatus::Running
    } else if raw.status.failed > 0 {
        PodStatus::Failed
    } else if raw.status.succeeded > 0 {
        PodStatus::Succeeded
    } else {
        PodStatus::Pending
    };

    let image = raw
        .spec
        .template
        .spec
        .containers
        .first()
        .map(|c| c.image.clone())
        .unwrap_or_default();

    let mut pod_name = String::new();
    if let Some(pods) = pods_by_job.get(&name) {
        if let Some(pod) = pods.first() {
            pod_name = pod.name.clone();
            status = pod.status.clone();
        }
    }

    JobInfo {
        name,
        namespace: raw.metadata.namespace_or_default(),
        labels: raw.metadata.labels,
        active: raw.status.active,
        failed: raw.status.failed,
        completions: raw.status.succeeded,
        start_time: raw.status.start_time,
        completion_time: raw.status.completion_time,
        status,
        image,
        pod_name,
    }
}
