use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{
    to_bytes,
    Body,
};
use axum::http::{
    Request,
    StatusCode,
};
use axum::Router;
use serde_json::{
    json,
    Value,
};
use sqlx::SqlitePool;
use tower::ServiceExt;

use robowatch_commons::cache::Cache;
use robowatch_commons::config::{
    ApiConfig,
    AppConfig,
    BackendConfig,
    MySqlConfig,
    PathsConfig,
    SshConfig,
};
use robowatch_commons::models::cluster::{
    JobInfo,
    PodStatus,
};
use robowatch_commons::models::robot::RobotKind;
use robowatch_commons::utils::db::create_db_tables;
use robowatch_commons::utils::robots::{
    get_robot_with_pool,
    list_robots_with_pool,
};
use robowatch_kube::KubeClient;
use robowatch_remote::{
    ExecutionsDb,
    SshSession,
};

use crate::state::AppState;

fn test_config() -> AppConfig {
    AppConfig {
        ssh: SshConfig {
            host: "127.0.0.1".to_string(),
            port: 22,
            username: "deploy".to_string(),
            use_key: false,
            key_path: None,
            password: Some("secret".to_string()),
        },
        mysql: MySqlConfig {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "watcher".to_string(),
            password: "secret".to_string(),
            database: "bwav4".to_string(),
            pool_size: 1,
        },
        paths: PathsConfig::default(),
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        },
        backend: BackendConfig {
            polling_interval_vm: 10,
            polling_interval_db: 10,
        },
    }
}

async fn test_app() -> (Router, Arc<AppState>, SqlitePool) {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory catalog");
    create_db_tables(&pool).await.expect("schema");

    let config = test_config();
    let ssh = Arc::new(SshSession::new(config.ssh.clone()));
    let mysql = Arc::new(ExecutionsDb::new(config.mysql.clone()));
    let kube = KubeClient::new(ssh.clone());
    let cache = Arc::new(Cache::new());

    let state = AppState::new(config, pool.clone(), cache, ssh, mysql, kube);
    (super::router(state.clone()), state, pool)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn rpa_body(name: &str) -> Value {
    json!({
        "name": name,
        "image_tag": "v1.2",
        "memory_limit_mb": 512,
        "max_instances": 3,
        "lifetime_seconds": 600
    })
}

#[tokio::test]
async fn test_list_rpas_empty() {
    let (app, _, _) = test_app().await;
    let (status, body) = send(&app, "GET", "/rpas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_create_rpa_persists_and_tags() {
    let (app, state, pool) = test_app().await;

    let (status, body) = send(&app, "POST", "/rpas", Some(rpa_body("att_infos_bitrix"))).await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");

    let robot = get_robot_with_pool("att_infos_bitrix", &pool).await.unwrap();
    assert!(robot.active);
    assert_eq!(robot.kind, RobotKind::Rpa);
    assert_eq!(robot.max_instances, Some(3));
    assert!(robot.tags.contains(&"Exec".to_string()));

    // the processed view is invalidated so the next DB tick rebuilds it
    assert!(state.cache.rpas_processed.read().await.is_none());
}

#[tokio::test]
async fn test_create_rpa_duplicate_conflict() {
    let (app, _, _) = test_app().await;
    send(&app, "POST", "/rpas", Some(rpa_body("bot"))).await;

    let (status, body) = send(&app, "POST", "/rpas", Some(rpa_body("bot"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("bot"));
}

#[tokio::test]
async fn test_create_rpa_validation() {
    let (app, _, _) = test_app().await;

    let mut body = rpa_body("bot");
    body["max_instances"] = json!(0);
    let (status, response) = send(&app, "POST", "/rpas", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("max_instances"));

    let (status, _) = send(&app, "POST", "/rpas", Some(rpa_body("bad name"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rpa_standby_and_activate_round_trip() {
    let (app, _, pool) = test_app().await;
    send(&app, "POST", "/rpas", Some(rpa_body("bot"))).await;

    let (status, _) = send(&app, "POST", "/rpas/bot/standby", None).await;
    assert_eq!(status, StatusCode::OK);
    let robot = get_robot_with_pool("bot", &pool).await.unwrap();
    assert!(!robot.active);
    assert!(robot.deactivated_at.is_some());

    let (status, _) = send(&app, "POST", "/rpas/bot/activate", None).await;
    assert_eq!(status, StatusCode::OK);
    let robot = get_robot_with_pool("bot", &pool).await.unwrap();
    assert!(robot.active);
    assert!(robot.deactivated_at.is_none());
}

#[tokio::test]
async fn test_delete_rpa_restores_count() {
    let (app, _, pool) = test_app().await;
    send(&app, "POST", "/rpas", Some(rpa_body("bot"))).await;
    assert_eq!(list_robots_with_pool(&pool, None).await.unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", "/rpas/bot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list_robots_with_pool(&pool, None).await.unwrap().is_empty());

    let (status, _) = send(&app, "DELETE", "/rpas/bot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rpa_fields() {
    let (app, _, pool) = test_app().await;
    send(&app, "POST", "/rpas", Some(rpa_body("bot"))).await;

    let (status, _) = send(
        &app,
        "PUT",
        "/rpas/bot",
        Some(json!({ "image_tag": "v2.0", "max_instances": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let robot = get_robot_with_pool("bot", &pool).await.unwrap();
    assert_eq!(robot.image_tag, "v2.0");
    assert_eq!(robot.max_instances, Some(5));
}

#[tokio::test]
async fn test_connection_status_defaults() {
    let (app, _, _) = test_app().await;
    let (status, body) = send(&app, "GET", "/connection/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ssh_connected"], json!(false));
    assert_eq!(body["mysql_connected"], json!(false));
}

#[tokio::test]
async fn test_executions_empty() {
    let (app, _, _) = test_app().await;
    let (status, body) = send(&app, "GET", "/executions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_failures_empty() {
    let (app, _, _) = test_app().await;
    let (status, body) = send(&app, "GET", "/failures", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, "GET", "/failures/ghost-pod", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_jobs_list_serves_snapshot() {
    let (app, state, _) = test_app().await;

    let mut labels = BTreeMap::new();
    labels.insert("nome_robo".to_string(), "att_infos_bitrix".to_string());
    state
        .cache
        .jobs
        .store(vec![JobInfo {
            name: "rpa-job-att-infos-bitrix-a1b2c".to_string(),
            namespace: "default".to_string(),
            labels,
            active: 1,
            failed: 0,
            completions: 0,
            start_time: String::new(),
            completion_time: String::new(),
            status: PodStatus::Running,
            image: "rpaglobal/att_infos_bitrix:v1.2".to_string(),
            pod_name: String::new(),
        }])
        .await;

    let (status, body) = send(&app, "GET", "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "rpa-job-att-infos-bitrix-a1b2c");
}

#[tokio::test]
async fn test_jobs_status_groups_by_slug() {
    let (app, state, _) = test_app().await;
    send(&app, "POST", "/rpas", Some(rpa_body("att_infos_bitrix"))).await;

    state
        .cache
        .jobs
        .store(vec![JobInfo {
            name: "rpa-job-att-infos-bitrix-a1b2c".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
            active: 2,
            failed: 1,
            completions: 4,
            start_time: String::new(),
            completion_time: String::new(),
            status: PodStatus::Running,
            image: String::new(),
            pod_name: String::new(),
        }])
        .await;

    let (status, body) = send(&app, "GET", "/jobs/status", None).await;
    assert_eq!(status, StatusCode::OK);

    let bucket = &body["att_infos_bitrix"];
    assert_eq!(bucket["running"], json!(2));
    assert_eq!(bucket["failed"], json!(1));
    assert_eq!(bucket["succeeded"], json!(4));
    assert_eq!(bucket["tipo"], json!("RPA"));
}

#[tokio::test]
async fn test_rpas_list_synthesizes_processed_view() {
    let (app, state, _) = test_app().await;
    send(&app, "POST", "/rpas", Some(rpa_body("bot"))).await;

    // poller has not run; the first read builds and caches the view
    let (status, body) = send(&app, "GET", "/rpas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "bot");
    assert_eq!(body[0]["execucoes_pendentes"], json!(0));
    assert!(state.cache.rpas_processed.read().await.is_some());
}

#[tokio::test]
async fn test_jobs_unknown_lists_unlabeled() {
    let (app, state, _) = test_app().await;

    let mut labeled = BTreeMap::new();
    labeled.insert("nome_robo".to_string(), "bot".to_string());
    let job = |name: &str, labels: BTreeMap<String, String>| JobInfo {
        name: name.to_string(),
        namespace: "default".to_string(),
        labels,
        active: 1,
        failed: 0,
        completions: 0,
        start_time: String::new(),
        completion_time: String::new(),
        status: PodStatus::Running,
        image: String::new(),
        pod_name: String::new(),
    };
    state
        .cache
        .jobs
        .store(vec![
            job("rpa-job-bot-a1b2c", labeled),
            job("mystery-29387700", BTreeMap::new()),
        ])
        .await;

    let (status, body) = send(&app, "GET", "/jobs/unknown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["jobs"][0]["name"], "mystery-29387700");
}

#[tokio::test]
async fn test_resources_vm_placeholder() {
    let (app, _, _) = test_app().await;
    let (status, body) = send(&app, "GET", "/resources/vm", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["memoria"].is_object());
    assert_eq!(body["error"], json!("not yet collected"));
}
