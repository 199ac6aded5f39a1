use log::info;
use serde::Deserialize;
use serde_json::json;

use robowatch_commons::models::cluster::DeploymentInfo;

use crate::client::{
    KubeClient,
    KubeList,
    RawMetadata,
};
use crate::error::KubeError;

#[derive(Debug, Default, Deserialize)]
struct RawDeployment {
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default)]
    spec: RawDeploymentSpec,
    #[serde(default)]
    status: RawDeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
struct RawDeploymentSpec {
    #[serde(default)]
    replicas: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RawDeploymentStatus {
    #[serde(default, rename = "readyReplicas")]
    ready_replicas: i64,
    #[serde(default, rename = "availableReplicas")]
    available_replicas: i64,
}

fn deployment_from_raw(raw: RawDeployment) -> DeploymentInfo {
    DeploymentInfo {
        name: raw.metadata.name.clone(),
        namespace: raw.metadata.namespace_or_default(),
        replicas: raw.spec.replicas,
        ready_replicas: raw.status.ready_replicas,
        available_replicas: raw.status.available_replicas,
    }
}

/// Fields of a generated Deployment manifest.
#[derive(Clone, Debug)]
pub struct DeploymentManifest {
    pub name: String,
    pub image: String,
    pub replicas: u32,
    pub memory_limit: String,
    pub robot_name: Option<String>,
}

pub fn build_deployment_manifest(spec: &DeploymentManifest) -> serde_json::Value {
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
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.name,
            "labels": {
                "app": spec.name
            }
        },
        "spec": {
            "replicas": spec.replicas,
            "selector": {
                "matchLabels": {
                    "app": spec.name
                }
            },
            "template": {
                "metadata": {
                    "labels": {
                        "app": spec.name
                    }
                },
                "spec": {
                    "imagePullSecrets": [{"name": "docker-hub-secret"}],
                    "containers": [container]
                }
            }
        }
    })
}

impl KubeClient {
    pub async fn list_deployments(&self) -> Result<Vec<DeploymentInfo>, KubeError> {
        let list: KubeList<RawDeployment> =
            self.kubectl_json("kubectl get deployments -o json").await?;
        Ok(list.items.into_iter().map(deployment_from_raw).collect())
    }

    /// Applies a manifest already present on the remote host.
    pub async fn apply_deployment(&self, remote_yaml_path: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!("kubectl apply -f {remote_yaml_path}"))
            .await
    }

    pub async fn create_deployment(&self, spec: &DeploymentManifest) -> Result<(), KubeError> {
        let manifest = build_deployment_manifest(spec);
        self.kubectl_create_stdin(&manifest).await?;
        info!("Deployment '{}' created", spec.name);
        Ok(())
    }

    pub async fn delete_deployment(&self, name: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!("kubectl delete deployment {name}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_from_raw() {
        let raw: RawDeployment = serde_json::from_str(
            r#"{
                "metadata": {"name": "api-proxy", "namespace": "default"},
                "spec": {"replicas": 3},
                "status": {"readyReplicas": 2, "availableReplicas": 2}
            }"#,
        )
        .unwrap();

        let info = deployment_from_raw(raw);
        assert_eq!(info.name, "api-proxy");
        assert_eq!(info.replicas, 3);
        assert_eq!(info.ready_replicas, 2);
        assert_eq!(info.available_replicas, 2);
    }

    #[test]
    fn test_deployment_defaults() {
        let raw: RawDeployment = serde_json::from_str(r#"{"metadata": {"name": "d"}}"#).unwrap();
        let info = deployment_from_raw(raw);
        assert_eq!(info.replicas, 0);
        assert_eq!(info.ready_replicas, 0);
        assert_eq!(info.namespace, "default");
    }

    #[test]
    fn test_build_deployment_manifest() {
        let manifest = build_deployment_manifest(&DeploymentManifest {
            name: "api-proxy".to_string(),
            image: "rpaglobal/api_proxy:v1".to_string(),
            replicas: 2,
            memory_limit: "256Mi".to_string(),
            robot_name: Some("api_proxy".to_string()),
        });

        assert_eq!(manifest["kind"], "Deployment");
        assert_eq!(manifest["spec"]["replicas"], 2);
        assert_eq!(manifest["spec"]["selector"]["matchLabels"]["app"], "api-proxy");

        let pod_spec = &manifest["spec"]["template"]["spec"];
        assert_eq!(pod_spec["imagePullSecrets"][0]["name"], "docker-hub-secret");
        assert_eq!(pod_spec["containers"][0]["image"], "rpaglobal/api_proxy:v1");
        assert_eq!(pod_spec["containers"][0]["env"][0]["value"], "api_proxy");
        assert_eq!(
            manifest["spec"]["template"]["metadata"]["labels"]["app"],
            "api-proxy"
        );
    }
}
