use std::collections::BTreeMap;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::models::cluster::ContainerInfo;

/// Number of days a failure record is retained before the harvester
/// purges it.
pub const RETENTION_DAYS: i64 = 7;

/// Snapshot of a pod caught in a failed state, persisted in the catalog
/// store so it survives the pod's deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub phase: String,
    pub status: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub containers: Vec<ContainerInfo>,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    #[serde(rename = "nome_robo")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robot_name: Option<String>,
    pub failed_at: DateTime<Utc>,
}
