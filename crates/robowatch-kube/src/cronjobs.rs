use chrono::Utc;
use log::info;
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::cluster::CronjobInfo;

use crate::client::{
    KubeClient,
    KubeList,
    RawContainerSpec,
    RawMetadata,
    KUBECTL_PROBE_TIMEOUT,
};
use crate::error::KubeError;

#[derive(Debug, Default, Deserialize)]
struct RawCronjob {
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default)]
    spec: RawCronjobSpec,
    #[serde(default)]
    status: RawCronjobStatus,
}

#[derive(Debug, Default, Deserialize)]
struct RawCronjobSpec {
    #[serde(default)]
    schedule: String,
    #[serde(default)]
    suspend: bool,
    #[serde(default, rename = "timeZone")]
    time_zone: Option<String>,
    #[serde(default, rename = "jobTemplate")]
    job_template: RawJobTemplate,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobTemplate {
    #[serde(default)]
    spec: RawJobTemplateSpec,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobTemplateSpec {
    #[serde(default, rename = "ttlSecondsAfterFinished")]
    ttl_seconds_after_finished: Option<i64>,
    #[serde(default)]
    template: RawPodTemplate,
}

#[derive(Debug, Default, Deserialize)]
struct RawPodTemplate {
    #[serde(default)]
    spec: RawPodTemplateSpec,
}

#[derive(Debug, Default, Deserialize)]
struct RawPodTemplateSpec {
    #[serde(default)]
    containers: Vec<RawContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCronjobStatus {
    #[serde(default, rename = "lastScheduleTime")]
    last_schedule_time: String,
    #[serde(default, rename = "lastSuccessfulTime")]
    last_successful_time: String,
}

fn cronjob_from_raw(raw: RawCronjob) -> CronjobInfo {
    let containers = &raw.spec.job_template.spec.template.spec.containers;
    let first = containers.first();

    let image = first.map(|c| c.image.clone()).unwrap_or_default();
    let robot_name = first
        .and_then(|c| c.env.iter().find(|env| env.name == "NOME_ROBO"))
        .map(|env| env.value.clone())
        .unwrap_or_default();
    let memory_limit = first
        .and_then(|c| c.resources.limits.get("memory").cloned())
        .unwrap_or_default();

    CronjobInfo {
        name: raw.metadata.name.clone(),
        namespace: raw.metadata.namespace_or_default(),
        schedule: raw.spec.schedule,
        suspended: raw.spec.suspend,
        last_schedule_time: raw.status.last_schedule_time,
        last_successful_time: raw.status.last_successful_time,
        image,
        robot_name,
        memory_limit,
        timezone: raw
            .spec
            .time_zone
            .unwrap_or_else(|| "America/Sao_Paulo".to_string()),
        ttl_seconds_after_finished: raw.spec.job_template.spec.ttl_seconds_after_finished.unwrap_or(60),
    }
}

/// Fields of a generated CronJob manifest.
#[derive(Clone, Debug)]
pub struct CronjobManifest {
    pub name: String,
    pub schedule: String,
    pub timezone: String,
    pub image: String,
    pub robot_name: Option<String>,
    pub memory_limit: String,
    pub ttl_seconds_after_finished: u64,
}

pub fn build_cronjob_manifest(spec: &CronjobManifest) -> serde_json::Value {
    let mut container = json!({
        "name": "rpa",
        "image": spec.image,
        "imagePullPolicy": "Always",
        "resources": {
            "limits": {
                "memory": spec.memory_limit
            }
        }
    });

    if let Some(robot_name) = &spec.robot_name {
        container["env"] = json!([{
            "name": "NOME_ROBO",
            "value": robot_name
        }]);
    }

    json!({
        "apiVersion": "batch/v1",
        "kind": "CronJob",
        "metadata": {
            "name": spec.name
        },
        "spec": {
            "schedule": spec.schedule,
            "timeZone": spec.timezone,
            "jobTemplate": {
                "spec": {
                    "ttlSecondsAfterFinished": spec.ttl_seconds_after_finished,
                    "template": {
                        "spec": {
                            "imagePullSecrets": [{"name": "docker-hub-secret"}],
                            "containers": [container],
                            "restartPolicy": "Never"
                        }
                    }
                }
            }
        }
    })
}

impl KubeClient {
    pub async fn list_cronjobs(&self) -> Result<Vec<CronjobInfo>, KubeError> {
        let list: KubeList<RawCronjob> =
            self.kubectl_json("kubectl get cronjobs -o json").await?;
        Ok(list.items.into_iter().map(cronjob_from_raw).collect())
    }

    pub async fn cronjob_exists(&self, name: &str) -> Result<bool, KubeError> {
        let output = self
            .ssh()
            .exec(&format!("kubectl get cronjob {name}"), KUBECTL_PROBE_TIMEOUT)
            .await?;
        Ok(output.success())
    }

    /// Applies a manifest already present on the remote host.
    pub async fn apply_cronjob(&self, remote_yaml_path: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!("kubectl apply -f {remote_yaml_path}"))
            .await
    }

    pub async fn create_cronjob(&self, spec: &CronjobManifest) -> Result<(), KubeError> {
        let manifest = build_cronjob_manifest(spec);
        self.kubectl_create_stdin(&manifest).await?;
        info!("Cronjob '{}' created", spec.name);
        Ok(())
    }

    pub async fn delete_cronjob(&self, name: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!("kubectl delete cronjob {name}"))
            .await
    }

    pub async fn suspend_cronjob(&self, name: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!(
            "kubectl patch cronjob {name} -p '{{\"spec\":{{\"suspend\":true}}}}'"
        ))
        .await
    }

    pub async fn unsuspend_cronjob(&self, name: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!(
            "kubectl patch cronjob {name} -p '{{\"spec\":{{\"suspend\":false}}}}'"
        ))
        .await
    }

    /// Fires a cronjob immediately as `<name>-manual-<epoch>`.
    pub async fn create_job_from_cronjob(&self, cronjob_name: &str) -> Result<String, KubeError> {
        let job_name = format!("{cronjob_name}-manual-{}", Utc::now().timestamp());
        self.kubectl_ok(&format!(
            "kubectl create job --from=cronjob/{cronjob_name} {job_name}"
        ))
        .await?;
        info!("Job '{job_name}' created from cronjob '{cronjob_name}'");
        Ok(job_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRONJOB_JSON: &str = r#"{
        "metadata": {"name": "rpa-cronjob-painel-de-processos-acessorias", "namespace": "default"},
        "spec": {
            "schedule": "0 6 * * *",
            "suspend": false,
            "timeZone": "America/Sao_Paulo",
            "jobTemplate": {
                "spec": {
                    "ttlSecondsAfterFinished": 120,
                    "template": {
                        "spec": {
                            "containers": [{
                                "name": "rpa",
                                "image": "rpaglobal/painel_de_processos_acessorias:v3",
                                "env": [{"name": "NOME_ROBO", "value": "painel_de_processos_acessorias"}],
                                "resources": {"limits": {"memory": "256Mi"}}
                            }]
                        }
                    }
                }
            }
        },
        "status": {"lastScheduleTime": "2026-07-30T06:00:00Z"}
    }"#;

    #[test]
    fn test_cronjob_from_raw() {
        let raw: RawCronjob = serde_json::from_str(CRONJOB_JSON).unwrap();
        let info = cronjob_from_raw(raw);

        assert_eq!(info.name, "rpa-cronjob-painel-de-processos-acessorias");
        assert_eq!(info.schedule, "0 6 * * *");
        assert!(!info.suspended);
        assert_eq!(info.image, "rpaglobal/painel_de_processos_acessorias:v3");
        assert_eq!(info.robot_name, "painel_de_processos_acessorias");
        assert_eq!(info.memory_limit, "256Mi");
        assert_eq!(info.timezone, "America/Sao_Paulo");
        assert_eq!(info.ttl_seconds_after_finished, 120);
        assert_eq!(info.last_schedule_time, "2026-07-30T06:00:00Z");
    }

    #[test]
    fn test_cronjob_defaults() {
        let raw: RawCronjob =
            serde_json::from_str(r#"{"metadata": {"name": "cj"}, "spec": {"schedule": "* * * * *"}}"#)
                .unwrap();
        let info = cronjob_from_raw(raw);
        assert_eq!(info.timezone, "America/Sao_Paulo");
        assert_eq!(info.ttl_seconds_after_finished, 60);
        assert_eq!(info.robot_name, "");
    }

    fn manifest_spec() -> CronjobManifest {
        CronjobManifest {
            name: "daily-export".to_string(),
            schedule: "0 6 * * *".to_string(),
            timezone: "America/Sao_Paulo".to_string(),
            image: "rpaglobal/daily_export:v2".to_string(),
            robot_name: Some("daily_export".to_string()),
            memory_limit: "256Mi".to_string(),
            ttl_seconds_after_finished: 60,
        }
    }

    #[test]
    fn test_build_cronjob_manifest() {
        let manifest = build_cronjob_manifest(&manifest_spec());

        assert_eq!(manifest["kind"], "CronJob");
        assert_eq!(manifest["metadata"]["name"], "daily-export");
        assert_eq!(manifest["spec"]["schedule"], "0 6 * * *");
        assert_eq!(manifest["spec"]["timeZone"], "America/Sao_Paulo");

        let job_spec = &manifest["spec"]["jobTemplate"]["spec"];
        assert_eq!(job_spec["ttlSecondsAfterFinished"], 60);

        let pod_spec = &job_spec["template"]["spec"];
        assert_eq!(pod_spec["restartPolicy"], "Never");
        assert_eq!(pod_spec["imagePullSecrets"][0]["name"], "docker-hub-secret");

        let container = &pod_spec["containers"][0];
        assert_eq!(container["image"], "rpaglobal/daily_export:v2");
        assert_eq!(container["env"][0]["value"], "daily_export");
        assert_eq!(container["resources"]["limits"]["memory"], "256Mi");
    }

    #[test]
    fn test_build_cronjob_manifest_without_robot_env() {
        let mut spec = manifest_spec();
        spec.robot_name = None;
        let manifest = build_cronjob_manifest(&spec);
        let container = &manifest["spec"]["jobTemplate"]["spec"]["template"]["spec"]["containers"][0];
        assert!(container.get("env").is_none());
    }
}
