use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::cluster::{
    CronjobInfo,
    DeploymentInfo,
    JobInfo,
    PodInfo,
};
use crate::models::execution::ExecutionsMap;
use crate::models::status::ConnectionStatus;
use crate::models::views::{
    CronjobSummary,
    DeploymentSummary,
    RpaSummary,
};
use crate::models::vm::VmResources;

/// One cached snapshot. `error` carries the last poll failure when the
/// previous data was retained.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single cache key. Writers replace the entry atomically, readers
/// clone out so they never hold the lock while serializing.
pub struct Slot<T> {
    inner: RwLock<Option<CacheEntry<T>>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            inner: RwLock::new(None),
        }
    }
}

impl<T: Clone + Default> Slot<T> {
    /// Stores a fresh snapshot and clears any previous error.
    pub async fn store(&self, data: T) {
        let mut guard = self.inner.write().await;
        let updated_at = next_stamp(guard.as_ref());
        *guard = Some(CacheEntry {
            data,
            updated_at,
            error: None,
        });
    }

    /// Records a poll failure: the previous data is retained (or the
    /// default when the slot was never filled) and the error is attached.
    pub async fn store_error(&self, error: impl Into<String>) {
        let mut guard = self.inner.write().await;
        let updated_at = next_stamp(guard.as_ref());
        let data = guard.as_ref().map(|e| e.data.clone()).unwrap_or_default();
        *guard = Some(CacheEntry {
            data,
            updated_at,
            error: Some(error.into()),
        });
    }

    pub async fn read(&self) -> Option<CacheEntry<T>> {
        self.inner.read().await.clone()
    }

    pub async fn data(&self) -> Option<T> {
        self.inner.read().await.as_ref().map(|e| e.data.clone())
    }

    pub async fn data_or_default(&self) -> T {
        self.data().await.unwrap_or_default()
    }

    /// Empties the slot so the next poll tick repopulates it.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }

    /// Applies a closure to the current value under the write lock.
    pub async fn update_with<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut guard = self.inner.write().await;
        let updated_at = next_stamp(guard.as_ref());
        let error = guard.as_ref().and_then(|e| e.error.clone());
        let mut data = guard.as_ref().map(|e| e.data.clone()).unwrap_or_default();
        f(&mut data);
        *guard = Some(CacheEntry {
            data,
            updated_at,
            error,
        });
    }
}

// `updated_at` never goes backward, even if the wall clock does.
fn next_stamp<T>(previous: Option<&CacheEntry<T>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(entry) if entry.updated_at > now => entry.updated_at,
        _ => now,
    }
}

/// All snapshots the polling engine maintains, one slot per key.
#[derive(Default)]
pub struct Cache {
    pub jobs: Slot<Vec<JobInfo>>,
    pub pods: Slot<Vec<PodInfo>>,
    pub cronjobs: Slot<Vec<CronjobInfo>>,
    pub deployments: Slot<Vec<DeploymentInfo>>,
    pub executions: Slot<ExecutionsMap>,
    pub vm_resources: Slot<VmResources>,
    pub connection_status: Slot<ConnectionStatus>,
    pub rpas_processed: Slot<Vec<RpaSummary>>,
    pub cronjobs_processed: Slot<Vec<CronjobSummary>>,
    pub deployments_processed: Slot<Vec<DeploymentSummary>>,
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }
}
