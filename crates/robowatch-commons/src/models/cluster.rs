use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

/// Derived pod status, computed from the phase plus container introspection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodStatus {
    Running,
    Pending,
    Failed,
    Succeeded,
    CrashLoopBackOff,
    Error,
    #[serde(untagged)]
    Other(String),
}

impl PodStatus {
    /// True for the states the failure harvester records.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PodStatus::Failed | PodStatus::Error | PodStatus::CrashLoopBackOff
        )
    }
}

impl std::fmt::Display for PodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PodStatus::Running => f.write_str("Running"),
            PodStatus::Pending => f.write_str("Pending"),
            PodStatus::Failed => f.write_str("Failed"),
            PodStatus::Succeeded => f.write_str("Succeeded"),
            PodStatus::CrashLoopBackOff => f.write_str("CrashLoopBackOff"),
            PodStatus::Error => f.write_str("Error"),
            PodStatus::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContainerState {
    Running {
        #[serde(default)]
        started: String,
    },
    Waiting {
        #[serde(default)]
        reason: String,
        #[serde(default)]
        message: String,
    },
    Terminated {
        #[serde(default)]
        exit_code: i64,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        finished: String,
    },
    Unknown,
}

impl ContainerState {
    /// True when the state alone marks the pod as failed: a non-zero exit
    /// or a crash-loop/error wait reason.
    pub fn is_failure(&self) -> bool {
        match self {
            ContainerState::Terminated { exit_code, .. } => *exit_code != 0,
            ContainerState::Waiting { reason, .. } => {
                reason.contains("CrashLoopBackOff") || reason.contains("Error")
            }
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restart_count: i64,
    pub state: ContainerState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub phase: String,
    pub status: PodStatus,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
}

impl PodInfo {
    /// Pods owned by a Job carry the `job-name` label; the rest belong to
    /// deployments or bare pods.
    pub fn is_job_pod(&self) -> bool {
        self.labels.contains_key("job-name")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Pods currently running for this job.
    #[serde(default)]
    pub active: i64,
    #[serde(default)]
    pub failed: i64,
    /// Successful completions.
    #[serde(default)]
    pub completions: i64,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub completion_time: String,
    pub status: PodStatus,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub pod_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CronjobInfo {
    pub name: String,
    pub namespace: String,
    pub schedule: String,
    pub suspended: bool,
    #[serde(default)]
    pub last_schedule_time: String,
    #[serde(default)]
    pub last_successful_time: String,
    #[serde(default)]
    pub image: String,
    /// Value of the NOME_ROBO container env var, when present.
    #[serde(default)]
    #[serde(rename = "nome_robo")]
    pub robot_name: String,
    #[serde(default)]
    pub memory_limit: String,
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub ttl_seconds_after_finished: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub replicas: i64,
    #[serde(default)]
    pub ready_replicas: i64,
    #[serde(default)]
    pub available_replicas: i64,
}

/// Per-pod usage sample from `kubectl top pods`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PodUsage {
    pub pod_name: String,
    pub cpu_used_millicores: i64,
    pub memory_used_mb: f64,
}
