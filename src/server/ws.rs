//! WebSocket event stream.
//!
//! Every connection immediately receives the current automation status
//! and then every event the service broadcasts. The only inbound
//! message the server understands is `{"type": "ping"}`.

use crate::app::AppContext;
use crate::broadcast::Event;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub async fn ws_handler(
    State(ctx): State<Arc<AppContext>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<AppContext>) {
    debug!("WebSocket client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut events = ctx.broadcaster.subscribe();

    // Greet the client with the current status so it can render
    // without waiting for the next loop tick.
    let status = ctx.status.read().await.clone();
    if let Ok(json) = serde_json::to_string(&Event::StatusUpdate(status)) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // Lagged subscribers skip missed events and carry on.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("WebSocket client lagged, skipped {} events", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if is_ping(&text) {
                            let pong = json!({"type": "pong"}).to_string();
                            if sender.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
    debug!("WebSocket client disconnected");
}

fn is_ping(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v["type"] == "ping")
        .unwrap_or(false)
}
