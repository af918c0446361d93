//! End-to-end HTTP surface tests: drive the full `axum::Router` built by
//! `build_router` through `tower::ServiceExt::oneshot`, exercising auth,
//! the response envelope, and the submit/claim/complete happy path the
//! way a real `X-API-Key`-bearing client would.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

use taskqueue::api::{build_router, AppState};
use taskqueue::domain::ports::EndpointRepository;
use taskqueue::infrastructure::database::{
    DatabaseConnection, SqliteEndpointRepository, SqliteTaskHistoryRepository, SqliteTaskRepository,
    SqliteTaskTypeRepository,
};
use taskqueue::services::{LifecycleEngine, TaskRegistry};

const API_KEY: &str = "test-api-key";

async fn test_pool() -> SqlitePool {
    let db = DatabaseConnection::connect("sqlite::memory:", 1).await.expect("connect in-memory db");
    db.pool().clone()
}

async fn router(pool: SqlitePool) -> axum::Router {
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let task_types = Arc::new(SqliteTaskTypeRepository::new(pool.clone()));
    let history = Arc::new(SqliteTaskHistoryRepository::new(pool.clone()));
    let endpoints: Arc<dyn EndpointRepository> = Arc::new(SqliteEndpointRepository::new(pool));

    let engine = Arc::new(LifecycleEngine::new(tasks, task_types.clone(), history, 3, 300, true));
    let registry = Arc::new(TaskRegistry::new(task_types));

    let state = AppState { engine, registry, endpoints: endpoints.clone(), api_key: Arc::new(API_KEY.to_string()) };
    build_router(endpoints, state, 1024 * 1024).await.expect("build router")
}

async fn send(
    router: &axum::Router,
    method: &str,
    path: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> (axum::http::StatusCode, Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(path);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            axum::body::Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => axum::body::Body::empty(),
    };
    let request = builder.body(body).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn health_is_reachable_without_auth() {
    let router = router(test_pool().await).await;
    let (status, body) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn missing_or_wrong_api_key_is_rejected() {
    let router = router(test_pool().await).await;

    let (status, body) = send(&router, "GET", "/task-types", None, None).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&router, "GET", "/task-types", Some("wrong-key"), None).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_submit_claim_complete_round_trip_over_http() {
    let router = router(test_pool().await).await;

    let schema = json!({
        "type": "object",
        "properties": { "msg": { "type": "string" } },
        "required": ["msg"],
    });
    let (status, body) = send(
        &router,
        "POST",
        "/task-types/register",
        Some(API_KEY),
        Some(json!({ "name": "t.echo", "version": "1.0.0", "param_schema": schema })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::CREATED);
    assert_eq!(body["data"]["name"], json!("t.echo"));

    let (status, body) = send(
        &router,
        "POST",
        "/tasks",
        Some(API_KEY),
        Some(json!({ "type": "t.echo", "params": { "msg": "hi" } })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::CREATED);
    assert_eq!(body["data"]["deduplicated"], json!(false));
    let task_id = body["data"]["id"].as_i64().unwrap();

    // Resubmitting identical params dedupes instead of erroring.
    let (status, body) = send(
        &router,
        "POST",
        "/tasks",
        Some(API_KEY),
        Some(json!({ "type": "t.echo", "params": { "msg": "hi" } })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["deduplicated"], json!(true));
    assert_eq!(body["data"]["id"].as_i64().unwrap(), task_id);

    let (status, body) = send(
        &router,
        "POST",
        "/tasks/claim",
        Some(API_KEY),
        Some(json!({ "worker_id": "w1", "sort_by": "created_at", "sort_order": "ASC" })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["id"].as_i64().unwrap(), task_id);
    assert_eq!(body["data"]["status"], json!("claimed"));

    let (status, body) = send(
        &router,
        "POST",
        &format!("/tasks/{task_id}/complete"),
        Some(API_KEY),
        Some(json!({ "worker_id": "w1", "success": true, "result": { "echoed": "hi" } })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("completed"));

    let (status, body) = send(&router, "GET", &format!("/tasks/{task_id}"), Some(API_KEY), None).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("completed"));
    assert_eq!(body["data"]["progress"], json!(100));
}

#[tokio::test]
async fn submitting_to_unknown_type_returns_404() {
    let router = router(test_pool().await).await;
    let (status, body) = send(
        &router,
        "POST",
        "/tasks",
        Some(API_KEY),
        Some(json!({ "type": "t.nope", "params": {} })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn submit_missing_required_body_field_fails_request_validation() {
    let router = router(test_pool().await).await;
    let (status, body) = send(&router, "POST", "/tasks", Some(API_KEY), Some(json!({ "params": {} }))).await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["details"].as_array().is_some());
}

#[tokio::test]
async fn claim_rejects_a_sort_by_value_outside_the_whitelist() {
    let router = router(test_pool().await).await;
    let (status, _) = send(
        &router,
        "POST",
        "/tasks/claim",
        Some(API_KEY),
        Some(json!({ "worker_id": "w1", "sort_by": "dedupe_key; DROP TABLE tasks;--" })),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
}
