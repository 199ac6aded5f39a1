use serde::{
    Deserialize,
    Serialize,
};

use crate::models::cluster::{
    CronjobInfo,
    DeploymentInfo,
};
use crate::models::robot::Robot;

/// Catalog RPA enriched with queue depth and live job count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpaSummary {
    #[serde(flatten)]
    pub robot: Robot,
    pub execucoes_pendentes: usize,
    pub jobs_ativos: i64,
}

/// Cluster cronjob overlaid with catalog metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CronjobSummary {
    #[serde(flatten)]
    pub cronjob: CronjobInfo,
    #[serde(rename = "apelido")]
    pub alias: String,
    pub tags: Vec<String>,
    pub dependente_de_execucoes: bool,
    pub execucoes_pendentes: usize,
}

/// Cluster deployment overlaid with catalog metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    #[serde(flatten)]
    pub deployment: DeploymentInfo,
    #[serde(rename = "apelido")]
    pub alias: String,
    pub tags: Vec<String>,
    pub dependente_de_execucoes: bool,
    pub execucoes_pendentes: usize,
}

/// One dashboard row: aggregated job/pod counts for a robot slug.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBucket {
    pub running: i64,
    pub pending: i64,
    pub error: i64,
    pub failed: i64,
    pub succeeded: i64,
    #[serde(rename = "tipo")]
    pub kind_label: String,
    pub execucoes_pendentes: usize,
    #[serde(rename = "apelido")]
    pub alias: String,
}
