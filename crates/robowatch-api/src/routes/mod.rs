use std::sync::Arc;

use axum::routing::{
    delete,
    get,
    post,
};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[cfg(test)]
mod tests;

pub mod connection;
pub mod cronjobs;
pub mod deployments;
pub mod executions;
pub mod failures;
pub mod jobs;
pub mod pods;
pub mod resources;
pub mod rpas;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rpas", get(rpas::list).post(rpas::create))
        .route(
            "/rpas/{name}",
            get(rpas::retrieve).put(rpas::update).delete(rpas::destroy),
        )
        .route("/rpas/{name}/standby", post(rpas::standby))
        .route("/rpas/{name}/activate", post(rpas::activate))
        .route("/cronjobs", get(cronjobs::list).post(cronjobs::create))
        .route(
            "/cronjobs/{name}",
            get(cronjobs::retrieve).delete(cronjobs::destroy),
        )
        .route("/cronjobs/{name}/standby", post(cronjobs::standby))
        .route("/cronjobs/{name}/activate", post(cronjobs::activate))
        .route("/cronjobs/{name}/run_now", post(cronjobs::run_now))
        .route(
            "/deployments",
            get(deployments::list).post(deployments::create),
        )
        .route(
            "/deployments/{name}",
            get(deployments::retrieve).delete(deployments::destroy),
        )
        .route("/deployments/{name}/standby", post(deployments::standby))
        .route("/deployments/{name}/activate", post(deployments::activate))
        .route("/jobs", get(jobs::list).post(jobs::create))
        .route("/jobs/status", get(jobs::status))
        .route("/jobs/unknown", get(jobs::unknown))
        .route("/jobs/{name}", delete(jobs::destroy))
        .route("/pods", get(pods::list))
        .route("/pods/{name}", delete(pods::destroy))
        .route("/pods/{name}/logs", get(pods::logs))
        .route("/executions", get(executions::list))
        .route("/failures", get(failures::list))
        .route("/failures/{name}", get(failures::retrieve))
        .route("/failures/{name}/logs", get(failures::logs))
        .route("/resources/vm", get(resources::vm))
        .route("/resources/pods", get(resources::pods))
        .route("/connection/status", get(connection::status))
        .route("/connection/test", post(connection::test))
        .route("/connection/reload", post(connection::reload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
