//! Core domain types: tasks, priorities, statuses, and chat messages.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up by the automation loop
    Pending,
    /// Currently being worked on
    InProgress,
    /// Finished successfully
    Completed,
    /// Abandoned after an error or exhausted retries
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Scheduling priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A unit of work tracked by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Materialize a draft into a stored task.
    ///
    /// New tasks start `pending` with identical creation and update
    /// timestamps.
    #[must_use]
    pub fn from_draft(draft: TaskDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            requirements: draft.requirements,
            acceptance_criteria: draft.acceptance_criteria,
            priority: draft.priority,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update, refreshing the update timestamp.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
}

/// Partial update for an existing task. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    /// A patch that only changes the status.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single entry in the chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            task_id: None,
        }
    }

    /// Attach the task this message produced.
    #[must_use]
    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending_with_equal_timestamps() {
        let task = Task::from_draft(TaskDraft {
            title: "Add login".to_string(),
            description: "Build the login form".to_string(),
            ..TaskDraft::default()
        });
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_apply_patch_refreshes_updated_at() {
        let mut task = Task::from_draft(TaskDraft::default());
        let created = task.created_at;
        task.apply(TaskPatch::status(TaskStatus::InProgress));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.updated_at >= created);
        assert_eq!(task.created_at, created);
    }

    #[test]
    fn test_apply_patch_leaves_absent_fields() {
        let mut task = Task::from_draft(TaskDraft {
            title: "Original".to_string(),
            ..TaskDraft::default()
        });
        task.apply(TaskPatch {
            description: Some("New description".to_string()),
            ..TaskPatch::default()
        });
        assert_eq!(task.title, "Original");
        assert_eq!(task.description, "New description");
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let status: TaskStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(status, TaskStatus::Failed);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(TaskPriority::Critical.to_string(), "critical");
    }

    #[test]
    fn test_chat_message_task_id_omitted_when_none() {
        let msg = ChatMessage::new(MessageRole::User, "hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("task_id"));
        let with_task = msg.with_task(Uuid::new_v4());
        let json = serde_json::to_string(&with_task).unwrap();
        assert!(json.contains("task_id"));
    }
}
