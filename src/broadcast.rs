//! Event fan-out to WebSocket subscribers.

use crate::automation::AutomationStatus;
use crate::task::{ChatMessage, Task};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Capacity of the broadcast channel; slow subscribers lag and drop.
const CHANNEL_CAPACITY: usize = 256;

/// Everything the service announces to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskDeleted { task_id: Uuid },
    ChatMessage(ChatMessage),
    StatusUpdate(AutomationStatus),
    AutomationStarted(AutomationStatus),
    AutomationStopped(AutomationStatus),
    AutomationError { message: String },
}

/// Serializes events once and fans them out to every subscriber.
///
/// Publishing with no subscribers is a no-op, so producers never need
/// to care whether anyone is listening.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(json) => {
                // send() errs only when there are no receivers.
                let _ = self.tx.send(json);
            }
            Err(e) => trace!("Failed to serialize event: {}", e),
        }
    }

    /// Open a subscription receiving every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskDraft};

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.publish(&Event::AutomationError {
            message: "boom".to_string(),
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_tagged_json() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe();
        let task = Task::from_draft(TaskDraft {
            title: "Test".to_string(),
            ..TaskDraft::default()
        });
        broadcaster.publish(&Event::TaskCreated(task.clone()));

        let json = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "task_created");
        assert_eq!(value["data"]["title"], "Test");
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let broadcaster = Broadcaster::new();
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();
        broadcaster.publish(&Event::TaskDeleted {
            task_id: Uuid::new_v4(),
        });
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn test_event_tag_names() {
        let json = serde_json::to_string(&Event::AutomationError {
            message: "x".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"automation_error\""));
        let json = serde_json::to_string(&Event::StatusUpdate(AutomationStatus::default())).unwrap();
        assert!(json.contains("\"type\":\"status_update\""));
    }
}
