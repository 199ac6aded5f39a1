use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::RwLock;

use robowatch_commons::cache::Cache;
use robowatch_commons::config::AppConfig;
use robowatch_kube::KubeClient;
use robowatch_remote::{
    ExecutionsDb,
    SshSession,
};

/// Everything the request handlers need, wired once at startup and passed
/// down explicitly.
pub struct AppState {
    pub config: RwLock<AppConfig>,
    pub catalog: SqlitePool,
    pub cache: Arc<Cache>,
    pub ssh: Arc<SshSession>,
    pub mysql: Arc<ExecutionsDb>,
    pub kube: KubeClient,
}

impl AppState {
    pub fn new(
        config: AppConfig, catalog: SqlitePool, cache: Arc<Cache>, ssh: Arc<SshSession>,
        mysql: Arc<ExecutionsDb>, kube: KubeClient,
    ) -> Arc<Self> {
        Arc::new(AppState {
            config: RwLock::new(config),
            catalog,
            cache,
            ssh,
            mysql,
            kube,
        })
    }
}
