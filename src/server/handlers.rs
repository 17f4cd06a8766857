//! REST handlers.
//!
//! Responses use small JSON envelopes (`{"tasks": [..]}`, `{"task":
//! ..}`) so the frontend can distinguish collections from single
//! resources without inspecting shapes.

use crate::app::AppContext;
use crate::broadcast::Event;
use crate::chat::{confirmation_reply, draft_task_from_message};
use crate::error::OttoError;
use crate::task::{ChatMessage, MessageRole, TaskDraft, TaskPatch};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// How many log lines `/api/logs` returns at most.
const LOG_TAIL_LINES: usize = 100;

/// Error wrapper mapping domain errors onto HTTP responses.
pub struct ApiError(OttoError);

impl From<OttoError> for ApiError {
    fn from(err: OttoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Tasks
// =============================================================================

pub async fn list_tasks(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let tasks = ctx.store.read().await.list();
    Json(json!({ "tasks": tasks }))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Json(draft): Json<TaskDraft>,
) -> impl IntoResponse {
    let task = ctx.store.write().await.create(draft);
    info!("Created task: {}", task.title);
    ctx.broadcaster.publish(&Event::TaskCreated(task.clone()));
    (StatusCode::CREATED, Json(json!({ "task": task })))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let task = ctx.store.read().await.get(id)?;
    Ok(Json(json!({ "task": task })))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<serde_json::Value>> {
    let task = ctx.store.write().await.update(id, patch)?;
    ctx.broadcaster.publish(&Event::TaskUpdated(task.clone()));
    Ok(Json(json!({ "task": task })))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.store.write().await.delete(id)?;
    ctx.broadcaster.publish(&Event::TaskDeleted { task_id: id });
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}

// =============================================================================
// Chat
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

pub async fn chat_message(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_message = ChatMessage::new(MessageRole::User, request.message.clone());
    ctx.chat.write().await.push(user_message.clone());
    ctx.broadcaster.publish(&Event::ChatMessage(user_message));

    if request.message.trim().is_empty() {
        let apology = ChatMessage::new(
            MessageRole::System,
            "Sorry, I couldn't create a task from that message. Please try again.",
        );
        ctx.chat.write().await.push(apology.clone());
        ctx.broadcaster.publish(&Event::ChatMessage(apology));
        warn!("Chat message rejected: empty");
        return Err(OttoError::config("empty chat message").into());
    }

    let mut draft = draft_task_from_message(&request.message);
    if let Some(context) = &request.context {
        draft.description = format!("{}\n\nContext: {context}", draft.description);
    }

    let task = ctx.store.write().await.create(draft.clone());
    ctx.broadcaster.publish(&Event::TaskCreated(task.clone()));

    let reply = confirmation_reply(&draft);
    let assistant = ChatMessage::new(MessageRole::Assistant, reply.clone()).with_task(task.id);
    ctx.chat.write().await.push(assistant.clone());
    ctx.broadcaster.publish(&Event::ChatMessage(assistant));

    Ok(Json(json!({ "response": reply, "task": task })))
}

pub async fn list_messages(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let messages = ctx.chat.read().await.list();
    Json(json!({ "messages": messages }))
}

// =============================================================================
// Status and logs
// =============================================================================

pub async fn status(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let status = ctx.status.read().await.clone();
    Json(json!({ "status": status }))
}

pub async fn logs(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let path = ctx.config.log_dir.join("otto.log");
    let lines: Vec<String> = match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            let all: Vec<&str> = content.lines().collect();
            let start = all.len().saturating_sub(LOG_TAIL_LINES);
            all[start..].iter().map(ToString::to_string).collect()
        }
        Err(_) => Vec::new(),
    };
    Json(json!({ "logs": lines }))
}

// =============================================================================
// Automation control
// =============================================================================

pub async fn start_automation(State(ctx): State<Arc<AppContext>>) -> ApiResult<Json<serde_json::Value>> {
    let started = ctx.start_automation().await?;
    let message = if started {
        "Automation started"
    } else {
        "Automation already running"
    };
    Ok(Json(json!({ "message": message })))
}

pub async fn stop_automation(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let stopped = ctx.stop_automation().await;
    let message = if stopped {
        "Automation stopped"
    } else {
        "Automation was not running"
    };
    Json(json!({ "message": message }))
}
