//! HTTP and WebSocket surface.

pub mod handlers;
pub mod ws;

use crate::app::AppContext;
use axum::routing::{any, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

/// Build the service router.
///
/// REST endpoints live under `/api`, the event stream under `/ws`, and
/// a pre-built frontend bundle (when present on disk) is served for
/// everything else.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let static_dir = ctx.config.static_dir.clone();

    let mut router = Router::new()
        .route("/api/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/api/tasks/{id}",
            get(handlers::get_task)
                .patch(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/api/chat/message", post(handlers::chat_message))
        // Legacy alias; same drafting/transcript/broadcast path.
        .route("/api/chat/create-task", post(handlers::chat_message))
        .route("/api/chat/messages", get(handlers::list_messages))
        .route("/api/status", get(handlers::status))
        .route("/api/logs", get(handlers::logs))
        .route("/api/automation/start", post(handlers::start_automation))
        .route("/api/automation/stop", post(handlers::stop_automation))
        .route("/ws", any(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(ctx);

    if static_dir.is_dir() {
        info!("Serving frontend bundle from {}", static_dir.display());
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
}
