use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use log::info;
use serde_json::json;

use robowatch_commons::config::AppConfig;
use robowatch_commons::models::status::ConnectionStatus;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ConnectionStatus> {
    Json(state.cache.connection_status.data_or_default().await)
}

/// Probes both transports synchronously; for diagnosing which side of the
/// fabric is degraded.
pub async fn test(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let ssh_ok = state.ssh.probe().await;
    let (mysql_ok, mysql_message) = state.mysql.probe().await;

    state
        .cache
        .connection_status
        .update_with(|current| {
            current.apply(
                Some(ssh_ok),
                (!ssh_ok).then(|| "SSH probe failed".to_string()),
                Some(mysql_ok),
                (!mysql_ok).then(|| mysql_message.clone()),
            )
        })
        .await;

    Json(json!({
        "ssh": {
            "ok": ssh_ok,
            "message": if ssh_ok { "SSH connection successful" } else { "SSH probe failed" },
        },
        "mysql": {
            "ok": mysql_ok,
            "message": mysql_message,
        }
    }))
}

/// Re-reads the INI file and drops both transports so the next operations
/// connect with the new settings.
pub async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = AppConfig::default_path();
    let config = AppConfig::load(&path)
        .map_err(|e| ApiError::Validation(format!("failed to reload {}: {e}", path.display())))?;

    state.ssh.reload(config.ssh.clone()).await;
    state.mysql.reload(config.mysql.clone()).await;
    *state.config.write().await = config;

    info!("Configuration reloaded from {}", path.display());
    Ok(Json(json!({ "message": "Configuration reloaded" })))
}
