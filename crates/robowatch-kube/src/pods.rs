use serde::Deserialize;

use robowatch_commons::models::cluster::{
    ContainerInfo,
    ContainerState,
    PodInfo,
    PodStatus,
};

use crate::client::{
    KubeClient,
    KubeList,
    RawContainerSpec,
    RawMetadata,
    KUBECTL_TIMEOUT,
};
use crate::error::KubeError;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPod {
    #[serde(default)]
    pub metadata: RawMetadata,
    #[serde(default)]
    pub spec: RawPodSpec,
    #[serde(default)]
    pub status: RawPodStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPodSpec {
    #[serde(default)]
    pub containers: Vec<RawContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPodStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(default, rename = "startTime")]
    pub start_time: String,
    #[serde(default, rename = "containerStatuses")]
    pub container_statuses: Vec<RawContainerStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawContainerStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default, rename = "restartCount")]
    pub restart_count: i64,
    #[serde(default)]
    pub state: RawContainerState,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawContainerState {
    pub running: Option<RawRunningState>,
    pub waiting: Option<RawWaitingState>,
    pub terminated: Option<RawTerminatedState>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawRunningState {
    #[serde(default, rename = "startedAt")]
    pub started_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawWaitingState {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTerminatedState {
    #[serde(default, rename = "exitCode")]
    pub exit_code: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default, rename = "finishedAt")]
    pub finished_at: String,
}

fn container_state(raw: &RawContainerState) -> ContainerState {
    if let Some(running) = &raw.running {
        ContainerState::Running {
            started: running.started_at.clone(),
        }
    } else if let Some(waiting) = &raw.waiting {
        ContainerState::Waiting {
            reason: waiting.reason.clone(),
            message: waiting.message.clone(),
        }
    } else if let Some(terminated) = &raw.terminated {
        ContainerState::Terminated {
            exit_code: terminated.exit_code,
            reason: terminated.reason.clone(),
            finished: terminated.finished_at.clone(),
        }
    } else {
        ContainerState::Unknown
    }
}

/// Derived pod status: the phase, refined by container introspection. A
/// crash-looping or non-zero-exited container overrides a Running phase.
pub fn derive_pod_status(phase: &str, containers: &[ContainerInfo]) -> PodStatus {
    match phase {
        "Failed" => PodStatus::Failed,
        "Succeeded" => PodStatus::Succeeded,
        "Pending" => PodStatus::Pending,
        "Running" => {
            for container in containers {
                match &container.state {
                    ContainerState::Waiting { reason, .. } => {
                        if reason.contains("CrashLoopBackOff") {
                            return PodStatus::CrashLoopBackOff;
                        }
                        if reason.contains("Error") {
                            return PodStatus::Error;
                        }
                    }
                    ContainerState::Terminated { exit_code, .. } if *exit_code != 0 => {
                        return PodStatus::Error;
                    }
                    _ => {}
                }
            }
            PodStatus::Running
        }
        other => PodStatus::Other(other.to_string()),
    }
}

pub(crate) fn pod_from_raw(raw: RawPod) -> PodInfo {
    let containers: Vec<ContainerInfo> = raw
        .status
        .container_statuses
        .iter()
        .map(|cs| ContainerInfo {
            name: cs.name.clone(),
            ready: cs.ready,
            restart_count: cs.restart_count,
            state: container_state(&cs.state),
        })
        .collect();

    let status = derive_pod_status(&raw.status.phase, &containers);

    PodInfo {
        name: raw.metadata.name.clone(),
        namespace: raw.metadata.namespace_or_default(),
        labels: raw.metadata.labels,
        phase: raw.status.phase,
        status,
        start_time: raw.status.start_time,
        containers,
    }
}

impl KubeClient {
    pub async fn list_pods(&self, selector: Option<&str>) -> Result<Vec<PodInfo>, KubeError> {
        let mut command = "kubectl get pods -o json".to_string();
        if let Some(selector) = selector {
            command.push_str(&format!(" -l {selector}"));
        }

        let list: KubeList<RawPod> = self.kubectl_json(&command).await?;
        Ok(list.items.into_iter().map(pod_from_raw).collect())
    }

    pub async fn delete_pod(&self, name: &str) -> Result<(), KubeError> {
        self.kubectl_ok(&format!("kubectl delete pod {name}")).await
    }

    pub async fn pod_logs(&self, name: &str, tail: u32) -> Result<String, KubeError> {
        let output = self
            .ssh()
            .exec(&format!("kubectl logs {name} --tail={tail}"), KUBECTL_TIMEOUT)
            .await?;
        if !output.success() {
            return Err(KubeError::from_output(&output));
        }
        Ok(output.stdout)
    }
}
