use std::sync::Arc;

use anyhow::Context;
use log::{
    error,
    info,
};
use tokio::task::JoinHandle;

use robowatch_commons::cache::Cache;
use robowatch_commons::config::AppConfig;
use robowatch_commons::models::status::ConnectionStatus;
use robowatch_commons::utils::db::{
    db_file_path,
    init_catalog_db,
};
use robowatch_engine::harvester::Harvester;
use robowatch_engine::poller::{
    ClusterPoller,
    DbPoller,
};
use robowatch_engine::reconciler::Reconciler;
use robowatch_engine::Shutdown;
use robowatch_kube::KubeClient;
use robowatch_remote::{
    ExecutionsDb,
    SshSession,
};

mod error;
mod routes;
mod state;

use crate::state::AppState;

fn setup_logger() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

#[tokio::main]
async fn main() {
    setup_logger();

    let config_path = AppConfig::default_path();
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot read configuration {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("Fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let catalog = init_catalog_db(&db_file_path())
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("catalog database initialization failed")?;

    let ssh = Arc::new(SshSession::new(config.ssh.clone()));
    let mysql = Arc::new(ExecutionsDb::new(config.mysql.clone()));
    let kube = KubeClient::new(ssh.clone());
    let cache = Arc::new(Cache::new());
    cache
        .connection_status
        .store(ConnectionStatus::default())
        .await;

    let shutdown = Shutdown::new();
    let mut loops: Vec<JoinHandle<()>> = Vec::new();

    let cluster_poller = ClusterPoller::new(
        kube.clone(),
        ssh.clone(),
        catalog.clone(),
        cache.clone(),
        config.backend.polling_interval_vm,
        shutdown.clone(),
    );
    loops.push(tokio::spawn(cluster_poller.run()));

    let db_poller = DbPoller::new(
        mysql.clone(),
        catalog.clone(),
        cache.clone(),
        config.backend.polling_interval_db,
        shutdown.clone(),
    );
    loops.push(tokio::spawn(db_poller.run()));

    let reconciler = Reconciler::new(
        kube.clone(),
        catalog.clone(),
        cache.clone(),
        config.paths.clone(),
        shutdown.clone(),
    );
    loops.push(tokio::spawn(reconciler.run()));

    let harvester = Harvester::new(
        kube.clone(),
        catalog.clone(),
        config.backend.polling_interval_vm,
        shutdown.clone(),
    );
    loops.push(tokio::spawn(harvester.run()));

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let state = AppState::new(config, catalog, cache, ssh, mysql, kube);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind API listener on {bind_addr}"))?;
    info!("API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal(shutdown.clone()))
        .await
        .context("API server failed")?;

    // loops observe the flag within 0.5 s; join them before exiting 0
    for handle in loops {
        let _ = handle.await;
    }
    info!("All loops drained, exiting");
    Ok(())
}

async fn wait_for_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Cannot install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
    shutdown.trip();
}
