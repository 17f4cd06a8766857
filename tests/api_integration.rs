//! In-process tests of the REST surface.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use otto::app::AppContext;
use otto::config::Config;
use otto::task::{TaskDraft, TaskStatus};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Arc<AppContext>, Router) {
    let ctx = AppContext::new(Config::default());
    let router = otto::server::router(Arc::clone(&ctx));
    (ctx, router)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_list_tasks_empty() {
    let (_ctx, router) = app();
    let (status, body) = send(&router, "GET", "/api/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"], json!([]));
}

#[tokio::test]
async fn test_create_and_fetch_task() {
    let (_ctx, router) = app();
    let (status, body) = send(
        &router,
        "POST",
        "/api/tasks",
        Some(json!({
            "title": "Add login",
            "description": "Build the login form",
            "priority": "high",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["task"]["status"], "pending");
    assert_eq!(body["task"]["priority"], "high");

    let id = body["task"]["id"].as_str().unwrap().to_string();
    let (status, body) = send(&router, "GET", &format!("/api/tasks/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["title"], "Add login");
}

#[tokio::test]
async fn test_get_unknown_task_is_404_with_detail() {
    let (_ctx, router) = app();
    let id = uuid::Uuid::new_v4();
    let (status, body) = send(&router, "GET", &format!("/api/tasks/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("Task not found"));
}

#[tokio::test]
async fn test_patch_updates_status_only() {
    let (ctx, router) = app();
    let task = ctx.store.write().await.create(TaskDraft {
        title: "Patch me".to_string(),
        ..TaskDraft::default()
    });

    let (status, body) = send(
        &router,
        "PATCH",
        &format!("/api/tasks/{}", task.id),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["status"], "completed");
    assert_eq!(body["task"]["title"], "Patch me");

    let stored = ctx.store.read().await.get(task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_delete_task() {
    let (ctx, router) = app();
    let task = ctx.store.write().await.create(TaskDraft::default());

    let (status, body) = send(&router, "DELETE", &format!("/api/tasks/{}", task.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted successfully");
    assert!(ctx.store.read().await.is_empty());

    let (status, _) = send(&router, "DELETE", &format!("/api/tasks/{}", task.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_message_creates_task_and_transcript() {
    let (ctx, router) = app();
    let (status, body) = send(
        &router,
        "POST",
        "/api/chat/message",
        Some(json!({"message": "urgent: build an api for reports"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"]["priority"], "critical");
    assert!(body["response"].as_str().unwrap().contains("created a task"));

    // User message plus assistant confirmation.
    let messages = ctx.chat.read().await.list();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].task_id.is_some());
    assert_eq!(ctx.store.read().await.len(), 1);
}

#[tokio::test]
async fn test_empty_chat_message_gets_apology() {
    let (ctx, router) = app();
    let (status, body) = send(
        &router,
        "POST",
        "/api/chat/message",
        Some(json!({"message": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].is_string());

    let messages = ctx.chat.read().await.list();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].content.contains("Sorry"));
    assert!(ctx.store.read().await.is_empty());
}

#[tokio::test]
async fn test_chat_messages_endpoint() {
    let (_ctx, router) = app();
    send(
        &router,
        "POST",
        "/api/chat/message",
        Some(json!({"message": "add tests for the parser"})),
    )
    .await;
    let (status, body) = send(&router, "GET", "/api/chat/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["role"], "user");
}

#[tokio::test]
async fn test_chat_create_task_alias_matches_chat_message() {
    let (ctx, router) = app();
    let (status, body) = send(
        &router,
        "POST",
        "/api/chat/create-task",
        Some(json!({
            "message": "document the deployment process",
            "context": "ops runbook",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("created a task"));
    assert!(body["task"]["description"]
        .as_str()
        .unwrap()
        .contains("ops runbook"));

    // The alias shares the full chat path: transcript and task both update.
    let messages = ctx.chat.read().await.list();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].task_id.is_some());
    assert_eq!(ctx.store.read().await.len(), 1);
}

#[tokio::test]
async fn test_status_endpoint_shape() {
    let (_ctx, router) = app();
    let (status, body) = send(&router, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["running"], false);
    assert_eq!(body["status"]["loop_count"], 0);
}

#[tokio::test]
async fn test_logs_endpoint_tails_log_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = Config::default();
    config.log_dir = dir.path().to_path_buf();
    let ctx = AppContext::new(config);
    let router = otto::server::router(Arc::clone(&ctx));

    let (status, body) = send(&router, "GET", "/api/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"], json!([]));

    std::fs::write(dir.path().join("otto.log"), "line one\nline two\n").unwrap();
    let (_, body) = send(&router, "GET", "/api/logs", None).await;
    assert_eq!(body["logs"], json!(["line one", "line two"]));
}

#[tokio::test]
async fn test_automation_start_stop_idempotent() {
    let (ctx, router) = app();

    let (status, body) = send(&router, "POST", "/api/automation/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Automation started");

    let (_, body) = send(&router, "POST", "/api/automation/start", None).await;
    assert_eq!(body["message"], "Automation already running");
    assert!(ctx.status.read().await.running);

    let (_, body) = send(&router, "POST", "/api/automation/stop", None).await;
    assert_eq!(body["message"], "Automation stopped");

    let (_, body) = send(&router, "POST", "/api/automation/stop", None).await;
    assert_eq!(body["message"], "Automation was not running");
    assert!(!ctx.status.read().await.running);
}

#[tokio::test]
async fn test_mutations_are_broadcast() {
    let (ctx, router) = app();
    let mut rx = ctx.broadcaster.subscribe();

    send(
        &router,
        "POST",
        "/api/tasks",
        Some(json!({"title": "Watched", "description": "x"})),
    )
    .await;

    let json = rx.recv().await.unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["type"], "task_created");
    assert_eq!(value["data"]["title"], "Watched");
}
