use serde::{
    Deserialize,
    Serialize,
};

const GIB: f64 = (1024u64 * 1024 * 1024) as f64;

fn to_gb(bytes: u64) -> f64 {
    (bytes as f64 / GIB * 100.0).round() / 100.0
}

/// Host telemetry collected over SSH. Field names follow the front-end
/// contract.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VmResources {
    #[serde(rename = "memoria")]
    pub memory: MemorySample,
    #[serde(rename = "armazenamento")]
    pub storage: StorageSample,
    pub cpu: CpuSample,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub total: u64,
    #[serde(rename = "livre")]
    pub free: u64,
    #[serde(rename = "usada")]
    pub used: u64,
    pub total_gb: f64,
    #[serde(rename = "livre_gb")]
    pub free_gb: f64,
    #[serde(rename = "usada_gb")]
    pub used_gb: f64,
}

impl MemorySample {
    pub fn from_bytes(total: u64, used: u64, free: u64) -> Self {
        MemorySample {
            total,
            free,
            used,
            total_gb: to_gb(total),
            free_gb: to_gb(free),
            used_gb: to_gb(used),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSample {
    pub total: u64,
    #[serde(rename = "livre")]
    pub free: u64,
    #[serde(rename = "usado")]
    pub used: u64,
    pub total_gb: f64,
    #[serde(rename = "livre_gb")]
    pub free_gb: f64,
    #[serde(rename = "usado_gb")]
    pub used_gb: f64,
}

impl StorageSample {
    pub fn from_bytes(total: u64, used: u64, free: u64) -> Self {
        StorageSample {
            total,
            free,
            used,
            total_gb: to_gb(total),
            free_gb: to_gb(free),
            used_gb: to_gb(used),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub total: f64,
    #[serde(rename = "usado")]
    pub used: f64,
    #[serde(rename = "livre")]
    pub idle: f64,
}

impl Default for CpuSample {
    fn default() -> Self {
        CpuSample {
            total: 100.0,
            used: 0.0,
            idle: 100.0,
        }
    }
}
