use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use robowatch_commons::models::execution::ExecutionsMap;

use crate::state::AppState;

pub async fn list(State(state): State<Arc<AppState>>) -> Json<ExecutionsMap> {
    Json(state.cache.executions.data_or_default().await)
}
